//! Configuration types for the network tap.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observer::ALL_URLS;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    /// URL patterns every capture listener is filtered by.
    pub url_patterns: Vec<String>,
    /// Re-fetch bodies of completed xmlhttprequest exchanges.
    pub fetch_bodies: bool,
    pub fetch_timeout_ms: u64,
}

impl TapConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            url_patterns: vec![ALL_URLS.to_string()],
            fetch_bodies: true,
            fetch_timeout_ms: 10_000,
        }
    }
}
