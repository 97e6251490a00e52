//! Sequencer error types

use thiserror::Error;

use crate::types::Stage;

/// Why a stage could not run to completion
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    /// The stage's element never appeared within the stage timeout
    #[error("stage {stage}: no element matching {anchor} after {waited_ms}ms")]
    ElementMissing {
        stage: Stage,
        anchor: String,
        waited_ms: u64,
    },

    /// The page did not react to an action within the stage timeout
    #[error("stage {stage}: {condition} not observed after {waited_ms}ms")]
    GuardTimeout {
        stage: Stage,
        condition: String,
        waited_ms: u64,
    },

    /// The element handle no longer refers to anything on the page
    #[error("stale element handle {0}")]
    StaleElement(u64),

    /// Host page failure
    #[error("host page error: {0}")]
    Page(String),
}
