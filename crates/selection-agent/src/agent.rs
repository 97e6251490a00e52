//! Selection handling inside the observed page.

use std::sync::Arc;

use netclip_core_types::TabId;
use netclip_event_bus::{Delivery, Endpoint, HandoffRequest, Message, MessageSender, Reply};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::handoff::build_handoff;
use crate::surface::{Affordance, AffordanceId, PageSurface, Point};

/// Where a pointer event landed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerTarget {
    Page,
    Affordance(AffordanceId),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub position: Point,
    pub target: PointerTarget,
}

impl PointerEvent {
    pub fn on_page(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            target: PointerTarget::Page,
        }
    }
}

/// A live selection and the affordance bound to it.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionContext {
    pub selected_text: String,
    pub affordance: Affordance,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SelectionChange {
    /// Not recording, or the release came from the affordance itself.
    Ignored,
    Cleared,
    Offered(AffordanceId),
}

/// Which bus call an activation was waiting on when it gave up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStep {
    Search,
    OpenPage,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ActivationOutcome {
    /// No live affordance with that id.
    Ignored,
    NotFound,
    HandedOff {
        request: HandoffRequest,
        stopped: bool,
    },
    /// The background answered the open-page request with `success:false`.
    /// Recording and the affordance stay as they were.
    HandoffFailed { request: HandoffRequest },
    /// The bus call resolved without a usable reply; selection stays live.
    Unanswered {
        step: HandoffStep,
        delivery: &'static str,
    },
    Rejected(String),
}

pub struct SelectionAgent {
    tab: TabId,
    config: AgentConfig,
    surface: Arc<dyn PageSurface>,
    recording: bool,
    selection: Option<SelectionContext>,
}

impl SelectionAgent {
    pub fn new(tab: TabId, config: AgentConfig, surface: Arc<dyn PageSurface>) -> Self {
        Self {
            tab,
            config,
            surface,
            recording: false,
            selection: None,
        }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::Tab(self.tab)
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn selection(&self) -> Option<&SelectionContext> {
        self.selection.as_ref()
    }

    /// Answer capture commands addressed to this tab. Anything else is not
    /// ours and gets no reply.
    pub fn handle_command(&mut self, message: &Message) -> Option<Reply> {
        match message {
            Message::StartRecording => {
                info!(tab = %self.tab, "recording enabled in page");
                self.recording = true;
                Some(Reply::ack(true))
            }
            Message::StopRecording => {
                info!(tab = %self.tab, "recording disabled in page");
                self.recording = false;
                self.dismiss();
                Some(Reply::ack(true))
            }
            other => {
                debug!(tab = %self.tab, kind = other.kind(), "message not handled by page agent");
                None
            }
        }
    }

    pub fn on_pointer_up(&mut self, event: &PointerEvent) -> SelectionChange {
        if !self.recording || matches!(event.target, PointerTarget::Affordance(_)) {
            return SelectionChange::Ignored;
        }

        let selected_text = self.surface.selection_text().trim().to_string();
        self.dismiss();
        if selected_text.is_empty() {
            return SelectionChange::Cleared;
        }

        let affordance = Affordance {
            id: AffordanceId::new(),
            label: self.config.affordance_label.clone(),
            position: Point::new(
                event.position.x + self.config.offset_x,
                event.position.y + self.config.offset_y,
            ),
        };
        if let Err(err) = self.surface.mount_affordance(&affordance) {
            warn!(tab = %self.tab, error = %err, "failed to mount affordance");
            return SelectionChange::Cleared;
        }
        debug!(
            tab = %self.tab,
            affordance = %affordance.id,
            text = %selected_text,
            "affordance offered"
        );
        let id = affordance.id;
        self.selection = Some(SelectionContext {
            selected_text,
            affordance,
        });
        SelectionChange::Offered(id)
    }

    /// Pointer-down anywhere but the affordance dismisses it.
    pub fn on_pointer_down(&mut self, event: &PointerEvent) {
        let inside = match (event.target, &self.selection) {
            (PointerTarget::Affordance(id), Some(ctx)) => ctx.affordance.id == id,
            _ => false,
        };
        if !inside {
            self.dismiss();
        }
    }

    /// Run the search-then-handoff chain for the live affordance.
    pub async fn activate(
        &mut self,
        id: AffordanceId,
        bus: &dyn MessageSender,
    ) -> ActivationOutcome {
        let Some(pending) = self.begin_activation(id) else {
            return ActivationOutcome::Ignored;
        };
        let outcome = pending.run(bus).await;
        self.finish_activation(&outcome);
        outcome
    }

    /// Detach the bus requests of an activation from the agent. `None` when
    /// `id` is not the live affordance.
    pub fn begin_activation(&self, id: AffordanceId) -> Option<PendingActivation> {
        let ctx = self.selection.as_ref().filter(|ctx| ctx.affordance.id == id)?;
        Some(PendingActivation {
            tab: self.tab,
            selected_text: ctx.selected_text.clone(),
        })
    }

    /// Apply an activation's outcome to the page.
    pub fn finish_activation(&mut self, outcome: &ActivationOutcome) {
        match outcome {
            ActivationOutcome::NotFound => self.surface.notify(&self.config.not_found_message),
            ActivationOutcome::HandoffFailed { .. } => {
                self.surface.notify(&self.config.handoff_failed_message)
            }
            ActivationOutcome::HandedOff { .. } => {
                self.recording = false;
                self.dismiss();
            }
            _ => {}
        }
    }

    fn dismiss(&mut self) {
        if let Some(ctx) = self.selection.take() {
            debug!(tab = %self.tab, affordance = %ctx.affordance.id, "affordance removed");
            self.surface.remove_affordance(ctx.affordance.id);
        }
    }
}

/// Bus half of an activation: search, open the handoff page, stop capture.
#[derive(Clone, Debug)]
pub struct PendingActivation {
    tab: TabId,
    selected_text: String,
}

impl PendingActivation {
    pub fn selected_text(&self) -> &str {
        &self.selected_text
    }

    pub async fn run(self, bus: &dyn MessageSender) -> ActivationOutcome {
        let from = Endpoint::Tab(self.tab);
        let search = bus
            .request(
                from,
                Endpoint::Background,
                Message::SearchRequests {
                    text: self.selected_text.clone(),
                },
            )
            .await;
        let reply = match search {
            Delivery::Replied(reply) => reply.into_search(),
            other => {
                warn!(tab = %self.tab, outcome = other.label(), "search request unanswered");
                return ActivationOutcome::Unanswered {
                    step: HandoffStep::Search,
                    delivery: other.label(),
                };
            }
        };

        let record = match reply {
            Some(search) if search.found => search.matching_request,
            _ => None,
        };
        let Some(record) = record else {
            info!(tab = %self.tab, text = %self.selected_text, "no matching network request");
            return ActivationOutcome::NotFound;
        };

        let request = match build_handoff(&record, &self.selected_text) {
            Ok(request) => request,
            Err(err) => {
                warn!(tab = %self.tab, error = %err, "cannot build handoff");
                return ActivationOutcome::Rejected(err.to_string());
            }
        };

        info!(tab = %self.tab, url = %request.url, "handing off matched request");
        let opened = bus
            .request(
                from,
                Endpoint::Background,
                Message::OpenHandoffPage {
                    request: request.clone(),
                },
            )
            .await;
        match opened {
            Delivery::Replied(reply) if reply.is_success() => {}
            Delivery::Replied(_) => {
                warn!(tab = %self.tab, url = %request.url, "handoff page could not be opened");
                return ActivationOutcome::HandoffFailed { request };
            }
            other => {
                warn!(tab = %self.tab, outcome = other.label(), "handoff page request unanswered");
                return ActivationOutcome::Unanswered {
                    step: HandoffStep::OpenPage,
                    delivery: other.label(),
                };
            }
        }

        let stopped = bus
            .request(from, Endpoint::Background, Message::StopRecording)
            .await
            .replied()
            .map(|reply| reply.is_success())
            .unwrap_or(false);
        if !stopped {
            debug!(tab = %self.tab, "stop after handoff was not acknowledged");
        }
        ActivationOutcome::HandedOff { request, stopped }
    }
}
