//! netclip page-context agent.
//!
//! Lives in the observed tab. While capture is on it watches pointer
//! releases, offers a single affordance for the selected text, and on
//! activation asks the background context to correlate the text and open the
//! handoff page.

pub mod agent;
pub mod config;
pub mod handoff;
pub mod runtime;
pub mod surface;

use thiserror::Error;

pub use agent::{
    ActivationOutcome, HandoffStep, PendingActivation, PointerEvent, PointerTarget,
    SelectionAgent, SelectionChange, SelectionContext,
};
pub use config::AgentConfig;
pub use handoff::build_handoff;
pub use runtime::{spawn_tab_context, PageEvent, TabContext};
pub use surface::{Affordance, AffordanceId, PageSurface, Point, RecordingSurface};

#[derive(Clone, Debug, Error)]
pub enum AgentError {
    #[error("selection is empty")]
    EmptySelection,
    #[error("invalid match pattern: {0}")]
    InvalidPattern(String),
    #[error("page surface unavailable: {0}")]
    Surface(String),
}
