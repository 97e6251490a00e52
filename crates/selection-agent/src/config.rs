//! Page-context agent settings.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub affordance_label: String,
    /// Offset of the affordance from the pointer-release position, in px.
    pub offset_x: f64,
    pub offset_y: f64,
    pub not_found_message: String,
    /// Shown when the background could not open the handoff page.
    pub handoff_failed_message: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            affordance_label: "🔍 Find in Network".to_string(),
            offset_x: 10.0,
            offset_y: 10.0,
            not_found_message: "No matching network request found for the selected text"
                .to_string(),
            handoff_failed_message: "Could not open the handoff page".to_string(),
        }
    }
}
