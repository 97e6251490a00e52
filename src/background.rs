//! The privileged background context.
//!
//! A single task owns the [`CaptureController`] and with it the request log.
//! It drains three inputs one at a time: observer deliveries, results of
//! spawned body re-reads and bus envelopes. Observer deliveries are drained
//! first, so a search always sees every exchange observed before it was sent.

use std::sync::Arc;
use std::time::Duration;

use handoff_flow::{HandoffSequencer, SequenceReport};
use netclip_core_types::TabId;
use netclip_event_bus::{Endpoint, Envelope, HandoffRequest, Mailbox, Message, MessageBus, Reply};
use network_tap::{BodyFetcher, BodyRequest, CaptureController, NetworkObserver, TapError};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::tabs::TabHost;

/// Outside collaborators of the background context.
#[derive(Clone)]
pub struct BackgroundDeps {
    pub bus: Arc<MessageBus>,
    pub observer: Arc<dyn NetworkObserver>,
    pub fetcher: Arc<dyn BodyFetcher>,
    pub tabs: Arc<dyn TabHost>,
}

/// How a handoff tab ended up after `OPEN_HANDOFF_PAGE`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HandoffEvent {
    Sequenced { tab: TabId, report: SequenceReport },
    TabFailed { tab: TabId, reason: String },
}

/// Handle to the running background context.
pub struct BackgroundHandle {
    /// One event per handoff tab, once its sequence has run or failed.
    pub handoffs: mpsc::UnboundedReceiver<HandoffEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<CaptureController>>,
}

impl BackgroundHandle {
    /// Stop the context and return the controller it owned.
    pub async fn shutdown(mut self) -> Option<CaptureController> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => task.await.ok(),
            None => None,
        }
    }
}

impl Drop for BackgroundHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

type FetchResult = (BodyRequest, Result<String, TapError>);

struct BackgroundContext {
    controller: CaptureController,
    fetcher: Arc<dyn BodyFetcher>,
    tabs: Arc<dyn TabHost>,
    sequencer: Arc<HandoffSequencer>,
    handoff_url: String,
    tab_load_timeout: Duration,
    fetch_tx: mpsc::UnboundedSender<FetchResult>,
    handoff_tx: mpsc::UnboundedSender<HandoffEvent>,
}

/// Register the background endpoint and start its task.
pub fn spawn_background(
    config: &Config,
    deps: BackgroundDeps,
) -> Result<BackgroundHandle, AppError> {
    let mailbox = deps.bus.register(Endpoint::Background)?;
    let (controller, events) = CaptureController::new(deps.observer, config.tap.clone());
    let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
    let (handoff_tx, handoff_rx) = mpsc::unbounded_channel();

    let context = BackgroundContext {
        controller,
        fetcher: deps.fetcher,
        tabs: deps.tabs,
        sequencer: Arc::new(HandoffSequencer::new(config.flow.clone())),
        handoff_url: config.flow.handoff_url.clone(),
        tab_load_timeout: config.flow.tab_load_timeout(),
        fetch_tx,
        handoff_tx,
    };

    let cancel = CancellationToken::new();
    let task = tokio::spawn(context.run(mailbox, events, fetch_rx, cancel.clone()));
    Ok(BackgroundHandle {
        handoffs: handoff_rx,
        cancel,
        task: Some(task),
    })
}

impl BackgroundContext {
    async fn run(
        mut self,
        mut mailbox: Mailbox,
        mut events: mpsc::UnboundedReceiver<network_tap::ObservedEvent>,
        mut fetches: mpsc::UnboundedReceiver<FetchResult>,
        cancel: CancellationToken,
    ) -> CaptureController {
        info!("background context started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(event) = events.recv() => {
                    if let Some(request) = self.controller.ingest(event) {
                        self.spawn_fetch(request);
                    }
                }
                Some((request, result)) = fetches.recv() => self.on_body(request, result),
                envelope = mailbox.recv() => {
                    let Some(mut envelope) = envelope else { break };
                    self.handle(&mut envelope).await;
                }
            }
        }
        info!("background context stopped");
        self.controller
    }

    async fn handle(&mut self, envelope: &mut Envelope) {
        debug!(from = %envelope.from, kind = envelope.message.kind(), "background message");
        let reply = match &envelope.message {
            Message::StartRecording => {
                let outcome = self.controller.start_recording();
                debug!(?outcome, "start requested");
                Reply::ack(true)
            }
            Message::StopRecording => {
                let outcome = self.controller.stop_recording();
                debug!(?outcome, "stop requested");
                Reply::ack(true)
            }
            Message::SearchRequests { text } => {
                let found = self.controller.find_match(text).cloned();
                info!(
                    text = %text,
                    found = found.is_some(),
                    searched = self.controller.log().len(),
                    "search handled"
                );
                Reply::search(found)
            }
            Message::OpenHandoffPage { request } => self.open_handoff(request.clone()).await,
        };
        if envelope.expects_reply() && !envelope.respond(reply) {
            debug!(from = %envelope.from, "sender stopped waiting for the reply");
        }
    }

    async fn open_handoff(&self, request: HandoffRequest) -> Reply {
        let tab = match self.tabs.open_tab(&self.handoff_url).await {
            Ok(tab) => tab,
            Err(err) => {
                warn!(url = %self.handoff_url, error = %err, "failed to open handoff tab");
                return Reply::ack(false);
            }
        };
        info!(%tab, url = %request.url, "handoff tab opened");

        tokio::spawn(run_handoff(
            self.tabs.clone(),
            self.sequencer.clone(),
            tab,
            request,
            self.tab_load_timeout,
            self.handoff_tx.clone(),
        ));
        Reply::ack(true)
    }

    fn spawn_fetch(&self, request: BodyRequest) {
        let fetcher = self.fetcher.clone();
        let results = self.fetch_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch_body(&request.url).await;
            let _ = results.send((request, result));
        });
    }

    fn on_body(&mut self, request: BodyRequest, result: Result<String, TapError>) {
        match result {
            Ok(body) => {
                self.controller.apply_body(&request, body);
            }
            Err(err) => warn!(url = %request.url, error = %err, "failed to re-fetch response body"),
        }
    }
}

/// Wait for the handoff tab to load, then run the sequence once.
async fn run_handoff(
    tabs: Arc<dyn TabHost>,
    sequencer: Arc<HandoffSequencer>,
    tab: TabId,
    request: HandoffRequest,
    load_timeout: Duration,
    events: mpsc::UnboundedSender<HandoffEvent>,
) {
    let event = match tabs.wait_complete(tab, load_timeout).await {
        Ok(()) => match tabs.host_page(tab) {
            Some(page) => {
                let report = sequencer.run(page.as_ref(), &request).await;
                HandoffEvent::Sequenced { tab, report }
            }
            None => HandoffEvent::TabFailed {
                tab,
                reason: "tab has no document".to_string(),
            },
        },
        Err(err) => {
            warn!(%tab, error = %err, "handoff tab never completed");
            HandoffEvent::TabFailed {
                tab,
                reason: err.to_string(),
            }
        }
    };
    let _ = events.send(event);
}
