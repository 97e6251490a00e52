//! netclip network tap.
//!
//! Records every exchange a tab makes while capture is on, keeps them in an
//! ordered [`RequestLog`] owned by the [`CaptureController`], and answers
//! correlation queries against that log.

pub mod config;
pub mod controller;
pub mod correlate;
pub mod fetch;
pub mod hub;
pub mod log;
pub mod observer;

use thiserror::Error;

pub use config::TapConfig;
pub use controller::{BodyRequest, CaptureController, CaptureState, StartOutcome, StopOutcome};
pub use correlate::{find_match, locate, Correlation, MatchSource};
pub use fetch::{BodyFetcher, CannedBodyFetcher, HttpBodyFetcher};
pub use hub::NetworkHub;
pub use log::RequestLog;
pub use observer::{
    EventSink, ExtraInfo, ListenerId, ListenerSpec, NetworkEvent, NetworkObserver, ObservedEvent,
    Phase, UrlFilter, ALL_URLS,
};

/// Errors emitted by the tap surface.
#[derive(Clone, Debug, Error)]
pub enum TapError {
    #[error("listener for {phase} rejected: {reason}")]
    ListenerRejected { phase: Phase, reason: String },
    #[error("unknown listener {0}")]
    UnknownListener(ListenerId),
    #[error("body fetch failed: {0}")]
    Fetch(String),
}
