//! The observed page as seen from the agent: its selection, a slot for the
//! affordance, and a way to tell the user something.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AgentError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AffordanceId(pub Uuid);

impl AffordanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AffordanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AffordanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Page coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The transient control offered after a selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Affordance {
    pub id: AffordanceId,
    pub label: String,
    pub position: Point,
}

pub trait PageSurface: Send + Sync {
    /// Current text selection, untrimmed.
    fn selection_text(&self) -> String;
    fn mount_affordance(&self, affordance: &Affordance) -> Result<(), AgentError>;
    fn remove_affordance(&self, id: AffordanceId);
    fn notify(&self, message: &str);
}

/// Surface that keeps everything in memory; the page is whatever the caller
/// says it is.
#[derive(Default)]
pub struct RecordingSurface {
    selection: Mutex<String>,
    mounted: Mutex<Vec<Affordance>>,
    notifications: Mutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, text: impl Into<String>) {
        *self.selection.lock() = text.into();
    }

    pub fn clear_selection(&self) {
        self.selection.lock().clear();
    }

    pub fn mounted(&self) -> Vec<Affordance> {
        self.mounted.lock().clone()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.notifications.lock().clone()
    }
}

impl PageSurface for RecordingSurface {
    fn selection_text(&self) -> String {
        self.selection.lock().clone()
    }

    fn mount_affordance(&self, affordance: &Affordance) -> Result<(), AgentError> {
        self.mounted.lock().push(affordance.clone());
        Ok(())
    }

    fn remove_affordance(&self, id: AffordanceId) {
        self.mounted.lock().retain(|mounted| mounted.id != id);
    }

    fn notify(&self, message: &str) {
        self.notifications.lock().push(message.to_string());
    }
}
