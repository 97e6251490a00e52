use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use handoff_flow::{FormSnapshot, SequenceStatus};
use netclip_core_types::{HeaderPair, ResourceType};
use netclip_event_bus::Message;
use network_tap::{CannedBodyFetcher, NetworkEvent, Phase};
use selection_agent::{
    ActivationOutcome, AffordanceId, PageEvent, PointerEvent, RecordingSurface,
};
use serde::Serialize;
use tokio::time::{sleep, timeout};
use tracing::info;

use super::output::{emit, OutputFormat};
use crate::background::HandoffEvent;
use crate::cli::context::CliContext;
use crate::session::Session;
use crate::tabs::SimTabHost;

const POLL: Duration = Duration::from_millis(20);
const POLL_ATTEMPTS: usize = 100;

#[derive(Args, Clone, Debug)]
pub struct DemoArgs {
    /// Text the simulated user selects on the page
    #[arg(long, default_value = "1.5 ETH")]
    pub text: String,

    /// API endpoint whose response carries the text
    #[arg(long, default_value = "https://api.wallet.example/v1/balance")]
    pub api_url: String,

    /// Simulated load time of the handoff tab, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub load_delay_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct DemoSummary {
    pub activation: ActivationOutcome,
    pub handoff: Option<HandoffEvent>,
    pub form: Option<FormSnapshot>,
}

pub async fn cmd_demo(args: DemoArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let summary = run_demo(ctx, &args).await?;
    emit(output, &summary, human_summary)
}

pub async fn run_demo(ctx: &CliContext, args: &DemoArgs) -> Result<DemoSummary> {
    let mut config = ctx.config().clone();
    config.tap.fetch_bodies = true;
    let handoff_budget = config.flow.tab_load_timeout()
        + config.flow.stage_timeout() * 8
        + Duration::from_millis(args.load_delay_ms);

    let body = format!(
        "{{\"wallet\":\"0x5e1f\",\"balance\":\"{}\",\"currency\":\"ETH\"}}",
        args.text.replace('"', "\\\"")
    );
    let fetcher = Arc::new(CannedBodyFetcher::new().with_body(args.api_url.clone(), body));
    let tabs = SimTabHost::new().with_load_delay(Duration::from_millis(args.load_delay_ms));
    let mut session = Session::start(config, fetcher, tabs)?;

    let surface = Arc::new(RecordingSurface::new());
    let (tab, mut page) = session.attach_tab(surface.clone())?;

    let started = session.popup(Message::StartRecording, Some(tab)).await;
    if !started.is_replied() {
        bail!("background did not acknowledge START_RECORDING ({})", started.label());
    }

    for event in page_traffic(&args.api_url) {
        session.observe(&event);
    }
    wait_until_searchable(&session, &args.text).await?;
    info!(text = %args.text, "exchange captured, selecting text");

    surface.select(args.text.clone());
    page.events
        .send(PageEvent::PointerUp(PointerEvent::on_page(240.0, 120.0)))
        .await
        .context("tab context stopped")?;
    let affordance = wait_for_affordance(&surface).await?;
    page.events
        .send(PageEvent::Activate(affordance))
        .await
        .context("tab context stopped")?;
    let activation = page
        .outcomes
        .recv()
        .await
        .ok_or_else(|| anyhow!("tab context stopped before answering"))?;

    let handoff = match activation {
        ActivationOutcome::HandedOff { .. } => {
            timeout(handoff_budget, session.background().handoffs.recv())
                .await
                .context("handoff sequence did not finish")?
        }
        _ => None,
    };
    let form = match &handoff {
        Some(HandoffEvent::Sequenced { tab, .. }) => {
            session.tabs().form(*tab).map(|form| form.snapshot())
        }
        _ => None,
    };

    page.shutdown().await;
    session.shutdown().await;
    Ok(DemoSummary {
        activation,
        handoff,
        form,
    })
}

/// Document load plus one API call carrying the balance.
fn page_traffic(api_url: &str) -> Vec<NetworkEvent> {
    let document = "https://wallet.example/dashboard";
    let request_headers = vec![
        HeaderPair::new("Accept", "application/json"),
        HeaderPair::new("Authorization", "Bearer demo-token"),
        HeaderPair::new("Cookie", "session=demo"),
    ];
    let response_headers = vec![HeaderPair::new("Content-Type", "application/json")];
    vec![
        NetworkEvent::new(Phase::BeforeSendHeaders, document, 1_000.0, ResourceType::MainFrame)
            .with_method("GET"),
        NetworkEvent::new(Phase::HeadersReceived, document, 1_050.0, ResourceType::MainFrame)
            .with_status(200)
            .with_response_headers(vec![HeaderPair::new("Content-Type", "text/html")]),
        NetworkEvent::new(Phase::Completed, document, 1_100.0, ResourceType::MainFrame)
            .with_status(200),
        NetworkEvent::new(Phase::BeforeSendHeaders, api_url, 1_200.0, ResourceType::XmlHttpRequest)
            .with_method("GET")
            .with_request_headers(request_headers),
        NetworkEvent::new(Phase::HeadersReceived, api_url, 1_250.0, ResourceType::XmlHttpRequest)
            .with_status(200)
            .with_response_headers(response_headers),
        NetworkEvent::new(Phase::Completed, api_url, 1_300.0, ResourceType::XmlHttpRequest)
            .with_status(200),
    ]
}

/// The body re-read lands asynchronously; wait until the text correlates.
async fn wait_until_searchable(session: &Session, text: &str) -> Result<()> {
    for _ in 0..POLL_ATTEMPTS {
        let found = session
            .search(text)
            .await
            .replied()
            .map(|reply| reply.is_success())
            .unwrap_or(false);
        if found {
            return Ok(());
        }
        sleep(POLL).await;
    }
    bail!("no captured exchange contains {text:?}")
}

async fn wait_for_affordance(surface: &RecordingSurface) -> Result<AffordanceId> {
    for _ in 0..POLL_ATTEMPTS {
        if let Some(affordance) = surface.mounted().first() {
            return Ok(affordance.id);
        }
        sleep(POLL).await;
    }
    bail!("affordance never appeared")
}

fn human_summary(summary: &DemoSummary) -> String {
    let mut lines = Vec::new();
    match &summary.activation {
        ActivationOutcome::HandedOff { request, stopped } => {
            lines.push(format!("matched {} {}", request.method, request.url));
            lines.push(format!("recording stopped: {stopped}"));
        }
        ActivationOutcome::HandoffFailed { request } => {
            lines.push(format!("matched {} {}", request.method, request.url));
            lines.push("handoff page could not be opened".to_string());
        }
        other => lines.push(format!("activation: {other:?}")),
    }
    match &summary.handoff {
        Some(HandoffEvent::Sequenced { report, .. }) => {
            let stages: Vec<&str> = report.completed.iter().map(|stage| stage.as_str()).collect();
            lines.push(format!("stages: {}", stages.join(" -> ")));
            if let SequenceStatus::Aborted { stage, reason } = &report.status {
                lines.push(format!("aborted at {stage}: {reason}"));
            }
        }
        Some(HandoffEvent::TabFailed { reason, .. }) => {
            lines.push(format!("handoff tab failed: {reason}"))
        }
        None => lines.push("no handoff".to_string()),
    }
    if let Some(form) = &summary.form {
        lines.push(format!("application: {}", form.application_name));
        lines.push(format!("endpoint: {}", form.endpoint));
        for header in &form.headers {
            let state = if header.enabled { "on" } else { "off" };
            lines.push(format!("header {}: {} [{state}]", header.name, header.value));
        }
    }
    lines.join("\n")
}
