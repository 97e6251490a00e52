//! Event loop of a tab's content context.

use std::sync::Arc;

use netclip_event_bus::{Envelope, Mailbox, MessageSender};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agent::{ActivationOutcome, PointerEvent, SelectionAgent};
use crate::surface::AffordanceId;

/// Input raised by the page itself.
#[derive(Clone, Debug, PartialEq)]
pub enum PageEvent {
    PointerUp(PointerEvent),
    PointerDown(PointerEvent),
    Activate(AffordanceId),
}

/// Handle to a running tab context.
pub struct TabContext {
    pub events: mpsc::Sender<PageEvent>,
    pub outcomes: mpsc::UnboundedReceiver<ActivationOutcome>,
    cancel: CancellationToken,
    task: Option<JoinHandle<SelectionAgent>>,
}

impl TabContext {
    /// Stop the loop and get the agent back.
    pub async fn shutdown(mut self) -> Option<SelectionAgent> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => task.await.ok(),
            None => None,
        }
    }
}

impl Drop for TabContext {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn the loop. Page events are handled one at a time, in arrival order;
/// bus commands are also answered while an activation waits on the
/// background.
pub fn spawn_tab_context(
    agent: SelectionAgent,
    mailbox: Mailbox,
    bus: Arc<dyn MessageSender>,
    capacity: usize,
) -> TabContext {
    let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
    let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_tab_context(
        agent,
        mailbox,
        events_rx,
        outcomes_tx,
        bus,
        cancel.clone(),
    ));
    TabContext {
        events: events_tx,
        outcomes: outcomes_rx,
        cancel,
        task: Some(task),
    }
}

async fn run_tab_context(
    mut agent: SelectionAgent,
    mut mailbox: Mailbox,
    mut events: mpsc::Receiver<PageEvent>,
    outcomes: mpsc::UnboundedSender<ActivationOutcome>,
    bus: Arc<dyn MessageSender>,
    cancel: CancellationToken,
) -> SelectionAgent {
    info!(tab = %agent.tab(), "tab context started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            envelope = mailbox.recv() => {
                let Some(envelope) = envelope else { break };
                serve(&mut agent, envelope);
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    PageEvent::PointerUp(pointer) => {
                        let change = agent.on_pointer_up(&pointer);
                        debug!(tab = %agent.tab(), ?change, "pointer released");
                    }
                    PageEvent::PointerDown(pointer) => agent.on_pointer_down(&pointer),
                    PageEvent::Activate(id) => {
                        let activation =
                            activate(&mut agent, &mut mailbox, bus.as_ref(), &cancel, id);
                        let Some(outcome) = activation.await else { break };
                        let _ = outcomes.send(outcome);
                    }
                }
            }
        }
    }
    info!(tab = %agent.tab(), "tab context stopped");
    agent
}

fn serve(agent: &mut SelectionAgent, mut envelope: Envelope) {
    if let Some(reply) = agent.handle_command(&envelope.message) {
        envelope.respond(reply);
    }
}

/// Drive one activation while still answering the mailbox. `None` when the
/// context is cancelled first.
async fn activate(
    agent: &mut SelectionAgent,
    mailbox: &mut Mailbox,
    bus: &dyn MessageSender,
    cancel: &CancellationToken,
    id: AffordanceId,
) -> Option<ActivationOutcome> {
    let Some(pending) = agent.begin_activation(id) else {
        return Some(ActivationOutcome::Ignored);
    };
    let chain = pending.run(bus);
    tokio::pin!(chain);
    let mut mailbox_open = true;
    let outcome = loop {
        tokio::select! {
            _ = cancel.cancelled() => return None,
            outcome = &mut chain => break outcome,
            envelope = mailbox.recv(), if mailbox_open => match envelope {
                Some(envelope) => serve(agent, envelope),
                None => mailbox_open = false,
            },
        }
    };
    agent.finish_activation(&outcome);
    Some(outcome)
}
