use handoff_flow::{
    FilledHeader, FlowConfig, FlowError, FormStep, HandoffSequencer, ScriptedFormPage,
    SequenceStatus, Stage,
};
use netclip_core_types::HeaderPair;
use netclip_event_bus::{HandoffRequest, MatchKind, ResponseMatch, ResponseRedaction};
use pretty_assertions::assert_eq;

const ALL_STAGES: [Stage; 7] = [
    Stage::OpenTemplate,
    Stage::NameApplication,
    Stage::Advance,
    Stage::FillEndpoint,
    Stage::ClearDefaultHeader,
    Stage::AddHeaderRows,
    Stage::FillHeaders,
];

fn request(headers: Vec<HeaderPair>) -> HandoffRequest {
    HandoffRequest {
        url: "https://api.example.com/v1/balance".to_string(),
        method: "GET".to_string(),
        headers,
        response_matches: vec![ResponseMatch {
            kind: MatchKind::Regex,
            value: r"1\.5 ETH".to_string(),
        }],
        response_redactions: vec![ResponseRedaction {
            regex: r"1\.5 ETH".to_string(),
        }],
    }
}

fn two_headers() -> Vec<HeaderPair> {
    vec![
        HeaderPair::new("Authorization", "Bearer abc"),
        HeaderPair::new("X-Client", "web"),
    ]
}

fn enabled(name: &str, value: &str) -> FilledHeader {
    FilledHeader {
        name: name.to_string(),
        value: value.to_string(),
        enabled: true,
    }
}

#[tokio::test(start_paused = true)]
async fn full_sequence_fills_the_form() {
    let page = ScriptedFormPage::new();
    let sequencer = HandoffSequencer::new(FlowConfig::default());

    let report = sequencer.run(&page, &request(two_headers())).await;

    assert_eq!(report.status, SequenceStatus::Completed);
    assert_eq!(report.completed, ALL_STAGES.to_vec());
    assert_eq!(report.headers_filled, 2);
    assert_eq!(report.headers_skipped, 0);

    let form = page.snapshot();
    assert_eq!(form.step, FormStep::Details);
    assert_eq!(form.application_name, "Network Request Proof");
    assert_eq!(form.endpoint, "https://api.example.com/v1/balance");
    assert_eq!(
        form.headers,
        vec![
            enabled("Authorization", "Bearer abc"),
            enabled("X-Client", "web")
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn switch_is_clicked_then_changed() {
    let page = ScriptedFormPage::new();
    HandoffSequencer::new(FlowConfig::default())
        .run(&page, &request(vec![HeaderPair::new("a", "1")]))
        .await;

    let journal = page.journal();
    let click = journal
        .iter()
        .position(|entry| entry.starts_with("click:HeaderSwitch"))
        .expect("switch clicked");
    assert!(journal[click + 1].starts_with("change:HeaderSwitch"));
}

#[tokio::test(start_paused = true)]
async fn slow_page_is_waited_for() {
    let page = ScriptedFormPage::new().with_render_lag(3);
    let report = HandoffSequencer::new(FlowConfig::default())
        .run(&page, &request(two_headers()))
        .await;

    assert!(report.is_completed(), "{report:?}");
    assert_eq!(page.snapshot().headers.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn missing_template_aborts_before_touching_the_page() {
    let page = ScriptedFormPage::new().without_template();
    let config = FlowConfig {
        stage_timeout_ms: 1_000,
        ..FlowConfig::default()
    };

    let report = HandoffSequencer::new(config).run(&page, &request(two_headers())).await;

    assert_eq!(report.aborted_at(), Some(Stage::OpenTemplate));
    assert!(report.completed.is_empty());
    assert_eq!(page.snapshot().step, FormStep::Template);
    assert!(page.journal().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unresponsive_add_button_aborts_without_rollback() {
    let page = ScriptedFormPage::new().with_inert_add_header();
    let report = HandoffSequencer::new(FlowConfig::default())
        .run(&page, &request(two_headers()))
        .await;

    let SequenceStatus::Aborted { stage, reason } = &report.status else {
        panic!("expected an abort, got {report:?}");
    };
    assert_eq!(*stage, Stage::AddHeaderRows);
    assert!(reason.contains("header row 1"), "{reason}");
    assert_eq!(report.completed, ALL_STAGES[..5].to_vec());

    let form = page.snapshot();
    assert_eq!(form.endpoint, "https://api.example.com/v1/balance");
    assert!(form.headers.is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_add_button_is_an_element_miss() {
    let page = ScriptedFormPage::new().without_add_header();
    let sequencer = HandoffSequencer::new(FlowConfig::default());
    let report = sequencer.run(&page, &request(two_headers())).await;

    assert_eq!(report.aborted_at(), Some(Stage::AddHeaderRows));
    let expected = FlowError::ElementMissing {
        stage: Stage::AddHeaderRows,
        anchor: r#"button[aria-label="Add header"]"#.to_string(),
        waited_ms: sequencer.config().stage_timeout_ms,
    };
    assert_eq!(
        report.status,
        SequenceStatus::Aborted {
            stage: Stage::AddHeaderRows,
            reason: expected.to_string(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn header_stages_can_be_disabled() {
    let page = ScriptedFormPage::new();
    let config = FlowConfig {
        fill_headers: false,
        ..FlowConfig::default()
    };
    let report = HandoffSequencer::new(config).run(&page, &request(two_headers())).await;

    assert!(report.is_completed());
    assert_eq!(report.completed, ALL_STAGES[..4].to_vec());
    // the default row is left alone
    assert_eq!(page.snapshot().headers.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn no_headers_only_clears_the_default_row() {
    let page = ScriptedFormPage::new();
    let report = HandoffSequencer::new(FlowConfig::default())
        .run(&page, &request(Vec::new()))
        .await;

    assert!(report.is_completed());
    assert_eq!(report.headers_filled, 0);
    assert!(page.snapshot().headers.is_empty());
}

#[tokio::test(start_paused = true)]
async fn form_without_default_row_is_fine() {
    let page = ScriptedFormPage::new().without_default_row();
    let report = HandoffSequencer::new(FlowConfig::default())
        .run(&page, &request(two_headers()))
        .await;

    assert!(report.is_completed());
    assert_eq!(page.snapshot().headers.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn next_button_selector_may_use_pseudo_classes() {
    let page = ScriptedFormPage::new();
    let mut config = FlowConfig::default();
    config.profile.next_button_selector = "button.stepper-next-button:not([disabled])".into();

    let report = HandoffSequencer::new(config).run(&page, &request(two_headers())).await;

    assert!(report.is_completed(), "{report:?}");
    assert_eq!(page.snapshot().step, FormStep::Details);
}

#[tokio::test(start_paused = true)]
async fn row_without_switch_keeps_the_next_rows_switch() {
    // Row 0 is the default row and gets cleared; row 1 is the first added.
    let page = ScriptedFormPage::new().with_switchless_row(1);
    let report = HandoffSequencer::new(FlowConfig::default())
        .run(&page, &request(two_headers()))
        .await;

    assert!(report.is_completed(), "{report:?}");
    assert_eq!(
        page.snapshot().headers,
        vec![
            FilledHeader {
                enabled: false,
                ..enabled("Authorization", "Bearer abc")
            },
            enabled("X-Client", "web"),
        ]
    );
}
