//! Errors raised while wiring the netclip contexts together.

use std::path::PathBuf;

use netclip_core_types::TabId;
use netclip_event_bus::BusError;
use network_tap::TapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value {value:?} for {name}")]
    InvalidOverride { name: &'static str, value: String },

    #[error("tab {0} is not open")]
    UnknownTab(TabId),

    #[error("tab {tab} did not finish loading within {waited_ms}ms")]
    TabLoadTimeout { tab: TabId, waited_ms: u64 },

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Tap(#[from] TapError),
}
