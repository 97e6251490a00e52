use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use netclip_event_bus::{Message, SearchReply};
use network_tap::{BodyFetcher, HttpBodyFetcher, NetworkEvent};
use serde::Serialize;
use tokio::fs;
use tracing::info;

use super::output::{emit, OutputFormat};
use crate::cli::context::CliContext;
use crate::session::Session;
use crate::tabs::SimTabHost;

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// JSON array of observer events (`phase`, `url`, `timeStamp`, `type`, ...)
    #[arg(long, value_name = "FILE")]
    pub events: PathBuf,

    /// Text to correlate against the replayed exchanges
    #[arg(long)]
    pub search: String,

    /// Re-fetch xmlhttprequest bodies over HTTP while replaying
    #[arg(long)]
    pub fetch_bodies: bool,

    /// Milliseconds to let body re-fetches land before searching
    #[arg(long, default_value_t = 2_000)]
    pub settle_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub events: usize,
    pub deliveries: usize,
    pub search: String,
    pub reply: SearchReply,
}

pub async fn cmd_replay(args: ReplayArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let raw = fs::read_to_string(&args.events)
        .await
        .with_context(|| format!("Failed to read events file {}", args.events.display()))?;
    let events: Vec<NetworkEvent> =
        serde_json::from_str(&raw).context("Events file is not a JSON array of observer events")?;

    let summary = replay(ctx, &args, events).await?;
    emit(output, &summary, |summary| {
        let mut text = format!(
            "replayed {} events ({} deliveries)\n",
            summary.events, summary.deliveries
        );
        match &summary.reply.matching_request {
            Some(record) => text.push_str(&format!(
                "match for {:?}: {} {} [{}]",
                summary.search,
                record.method_or_default(),
                record.url,
                record.request_type
            )),
            None => text.push_str(&format!("no match for {:?}", summary.search)),
        }
        text
    })
}

pub async fn replay(
    ctx: &CliContext,
    args: &ReplayArgs,
    events: Vec<NetworkEvent>,
) -> Result<ReplaySummary> {
    let mut config = ctx.config().clone();
    config.tap.fetch_bodies = args.fetch_bodies;
    let fetcher: Arc<dyn BodyFetcher> = Arc::new(HttpBodyFetcher::new(&config.tap)?);
    let session = Session::start(config, fetcher, SimTabHost::new())?;

    let started = session.popup(Message::StartRecording, None).await;
    if !started.is_replied() {
        bail!("background did not acknowledge START_RECORDING ({})", started.label());
    }

    let deliveries: usize = events.iter().map(|event| session.observe(event)).sum();
    info!(events = events.len(), deliveries, "events replayed");
    if args.fetch_bodies {
        tokio::time::sleep(Duration::from_millis(args.settle_ms)).await;
    }

    let delivery = session.search(&args.search).await;
    let label = delivery.label();
    let reply = delivery
        .replied()
        .and_then(|reply| reply.into_search())
        .ok_or_else(|| anyhow!("search went unanswered ({label})"))?;

    session.shutdown().await;
    Ok(ReplaySummary {
        events: events.len(),
        deliveries,
        search: args.search.clone(),
        reply,
    })
}
