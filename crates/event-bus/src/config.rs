//! Bus tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// How long a request waits for its reply before resolving as timed out.
    pub request_timeout_ms: u64,
    /// Queued envelopes per endpoint before senders wait.
    pub mailbox_capacity: usize,
}

impl BusConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            mailbox_capacity: 64,
        }
    }
}
