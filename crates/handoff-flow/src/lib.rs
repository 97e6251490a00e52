//! Handoff automation
//!
//! Once the handoff tab has loaded, the sequencer replays a matched network
//! exchange into the handoff application's multi-step form: pick the template,
//! name the application, fill the endpoint and then the header rows.

pub mod config;
pub mod errors;
pub mod page;
pub mod plan;
pub mod scripted;
pub mod sequencer;
pub mod types;

pub use config::{FlowConfig, TargetProfile, DEFAULT_HANDOFF_URL};
pub use errors::FlowError;
pub use page::HostPage;
pub use plan::{HeaderRow, HeaderRowPlan, RowElements};
pub use scripted::{FilledHeader, FormSnapshot, FormStep, ScriptedFormPage};
pub use sequencer::HandoffSequencer;
pub use types::{Anchor, DomEvent, ElementHandle, SequenceReport, SequenceStatus, Stage};
