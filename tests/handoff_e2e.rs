use std::sync::Arc;
use std::time::Duration;

use netclip_cli::{Config, HandoffEvent, Session, SimTabHost};
use netclip_core_types::{HeaderPair, ResourceType};
use netclip_event_bus::{Delivery, Message, Reply};
use network_tap::{CannedBodyFetcher, NetworkEvent, Phase};
use handoff_flow::{FilledHeader, FormStep, Stage};
use pretty_assertions::assert_eq;
use selection_agent::{
    ActivationOutcome, AffordanceId, PageEvent, PointerEvent, RecordingSurface, TabContext,
};
use tokio::time::{sleep, timeout};

const API: &str = "https://api.wallet.test/v1/balance";
const BODY: &str = r#"{"wallet":"0xabc","balance":"1.5 ETH"}"#;

fn fast_config() -> Config {
    let mut config = Config::default();
    config.flow.poll_interval_ms = 5;
    config.flow.stage_timeout_ms = 500;
    config.flow.tab_load_timeout_ms = 1_000;
    config.bus.request_timeout_ms = 1_000;
    config
}

fn start_session() -> Session {
    let fetcher = Arc::new(CannedBodyFetcher::new().with_body(API, BODY));
    Session::start(fast_config(), fetcher, SimTabHost::new()).unwrap()
}

fn api_exchange() -> Vec<NetworkEvent> {
    vec![
        NetworkEvent::new(Phase::BeforeSendHeaders, API, 10.0, ResourceType::XmlHttpRequest)
            .with_method("GET")
            .with_request_headers(vec![
                HeaderPair::new("Authorization", "Bearer t0k"),
                HeaderPair::new("Cookie", "sid=1"),
            ]),
        NetworkEvent::new(Phase::HeadersReceived, API, 11.0, ResourceType::XmlHttpRequest)
            .with_status(200)
            .with_response_headers(vec![HeaderPair::new("Content-Type", "application/json")]),
        NetworkEvent::new(Phase::Completed, API, 12.0, ResourceType::XmlHttpRequest)
            .with_status(200),
    ]
}

async fn search(session: &Session, text: &str) -> bool {
    match session.search(text).await {
        Delivery::Replied(reply) => reply.is_success(),
        other => panic!("search went unanswered: {}", other.label()),
    }
}

async fn eventually_found(session: &Session, text: &str) -> bool {
    for _ in 0..100 {
        if search(session, text).await {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    false
}

async fn affordance(surface: &RecordingSurface) -> AffordanceId {
    for _ in 0..100 {
        if let Some(affordance) = surface.mounted().first() {
            return affordance.id;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("affordance never mounted");
}

async fn select_and_activate(
    page: &mut TabContext,
    surface: &RecordingSurface,
    text: &str,
) -> ActivationOutcome {
    surface.select(text);
    page.events
        .send(PageEvent::PointerUp(PointerEvent::on_page(50.0, 60.0)))
        .await
        .unwrap();
    let id = affordance(surface).await;
    page.events.send(PageEvent::Activate(id)).await.unwrap();
    timeout(Duration::from_secs(5), page.outcomes.recv())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn selection_is_handed_off_and_the_form_is_filled() {
    let mut session = start_session();
    let surface = Arc::new(RecordingSurface::new());
    let (tab, mut page) = session.attach_tab(surface.clone()).unwrap();

    let started = session.popup(Message::StartRecording, Some(tab)).await;
    assert_eq!(started, Delivery::Replied(Reply::ack(true)));
    for event in api_exchange() {
        session.observe(&event);
    }
    assert!(eventually_found(&session, "1.5 ETH").await);

    let outcome = select_and_activate(&mut page, &surface, "1.5 ETH").await;
    let ActivationOutcome::HandedOff { request, stopped } = outcome else {
        panic!("expected a handoff, got {outcome:?}");
    };
    assert!(stopped);
    assert_eq!(request.url, API);
    assert_eq!(request.response_matches[0].value, r"1\.5 ETH");

    let event = timeout(Duration::from_secs(5), session.background().handoffs.recv())
        .await
        .unwrap()
        .unwrap();
    let HandoffEvent::Sequenced { tab: handoff_tab, report } = event else {
        panic!("handoff tab failed: {event:?}");
    };
    assert!(report.is_completed(), "{:?}", report.status);
    assert_eq!(report.completed.last(), Some(&Stage::FillHeaders));
    assert_eq!(report.headers_filled, 2);

    let form = session.tabs().form(handoff_tab).unwrap().snapshot();
    assert_eq!(form.step, FormStep::Details);
    assert_eq!(form.application_name, "Network Request Proof");
    assert_eq!(form.endpoint, API);
    assert_eq!(
        form.headers,
        vec![
            FilledHeader {
                name: "Authorization".into(),
                value: "Bearer t0k".into(),
                enabled: true,
            },
            FilledHeader {
                name: "Cookie".into(),
                value: "sid=1".into(),
                enabled: true,
            },
        ]
    );

    // The agent stopped recording after the handoff, which cleared the log.
    assert!(!search(&session, "1.5 ETH").await);
    assert_eq!(session.hub().listener_count(), 0);

    page.shutdown().await;
    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_handoff_tab_is_reported_as_failed() {
    let mut config = fast_config();
    config.flow.tab_load_timeout_ms = 50;
    let fetcher = Arc::new(CannedBodyFetcher::new().with_body(API, BODY));
    let tabs = SimTabHost::new().with_load_delay(Duration::from_millis(500));
    let mut session = Session::start(config, fetcher, tabs).unwrap();
    let surface = Arc::new(RecordingSurface::new());
    let (tab, mut page) = session.attach_tab(surface.clone()).unwrap();

    session.popup(Message::StartRecording, Some(tab)).await;
    for event in api_exchange() {
        session.observe(&event);
    }
    assert!(eventually_found(&session, "1.5 ETH").await);

    let outcome = select_and_activate(&mut page, &surface, "1.5 ETH").await;
    assert!(matches!(outcome, ActivationOutcome::HandedOff { .. }), "{outcome:?}");

    let event = timeout(Duration::from_secs(5), session.background().handoffs.recv())
        .await
        .unwrap()
        .unwrap();
    let HandoffEvent::TabFailed { tab: handoff_tab, reason } = event else {
        panic!("expected the handoff tab to fail, got {event:?}");
    };
    assert!(!reason.is_empty());
    let form = session.tabs().form(handoff_tab).unwrap().snapshot();
    assert_eq!(form.step, FormStep::Template);
    assert!(form.endpoint.is_empty());

    page.shutdown().await;
    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unmatched_selection_notifies_and_keeps_recording() {
    let session = start_session();
    let surface = Arc::new(RecordingSurface::new());
    let (tab, mut page) = session.attach_tab(surface.clone()).unwrap();

    session.popup(Message::StartRecording, Some(tab)).await;
    for event in api_exchange() {
        session.observe(&event);
    }
    assert!(eventually_found(&session, "0xabc").await);

    let outcome = select_and_activate(&mut page, &surface, "42 BTC").await;
    assert_eq!(outcome, ActivationOutcome::NotFound);
    assert_eq!(surface.notifications().len(), 1);
    assert!(session.tabs().opened().is_empty());
    assert!(search(&session, "0xabc").await);
    assert_eq!(session.hub().listener_count(), 3);

    page.shutdown().await;
    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_start_keeps_one_listener_set() {
    let session = start_session();
    for _ in 0..3 {
        let delivery = session.popup(Message::StartRecording, None).await;
        assert!(delivery.is_replied());
    }
    assert_eq!(session.hub().listener_count(), 3);
    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_search_is_not_found() {
    let session = start_session();
    session.popup(Message::StartRecording, None).await;
    for event in api_exchange() {
        session.observe(&event);
    }
    assert!(eventually_found(&session, "1.5 ETH").await);
    assert!(!search(&session, "").await);
    assert!(!search(&session, "   ").await);
    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_clears_captured_exchanges() {
    let session = start_session();
    session.popup(Message::StartRecording, None).await;
    for event in api_exchange() {
        session.observe(&event);
    }
    assert!(eventually_found(&session, "0xabc").await);

    let stopped = session.popup(Message::StopRecording, None).await;
    assert_eq!(stopped, Delivery::Replied(Reply::ack(true)));
    assert!(!search(&session, "0xabc").await);
    assert_eq!(session.hub().listener_count(), 0);

    // Events after the stop reach nobody.
    assert_eq!(session.observe(&api_exchange()[0]), 0);
    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn demo_command_runs_the_whole_flow() {
    use netclip_cli::cli::context::CliContext;
    use netclip_cli::cli::demo::{run_demo, DemoArgs};

    let ctx = CliContext::new(fast_config(), None);
    let args = DemoArgs {
        text: "7 pts".to_string(),
        api_url: API.to_string(),
        load_delay_ms: 10,
    };
    let summary = run_demo(&ctx, &args).await.unwrap();

    assert!(matches!(
        summary.activation,
        ActivationOutcome::HandedOff { stopped: true, .. }
    ));
    let form = summary.form.unwrap();
    assert_eq!(form.endpoint, API);
    assert_eq!(form.headers.len(), 3);
}
