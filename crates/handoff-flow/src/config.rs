use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HANDOFF_URL: &str = "https://dev.reclaimprotocol.org/new-application";

/// Texts, placeholders and selectors the handoff application's form is known by.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetProfile {
    pub template_button_text: String,
    pub application_name_placeholder: String,
    pub application_name: String,
    pub next_button_selector: String,
    pub endpoint_placeholder: String,
    pub delete_header_label: String,
    pub add_header_label: String,
    /// Container holding one header row's key, value and switch.
    pub header_row_selector: String,
    pub header_key_placeholder: String,
    pub header_value_placeholder: String,
    pub header_switch_selector: String,
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self {
            template_button_text: "zkFetchApp".to_string(),
            application_name_placeholder: "Application Name".to_string(),
            application_name: "Network Request Proof".to_string(),
            next_button_selector: "button.stepper-next-button".to_string(),
            endpoint_placeholder: "https://api.reclaimprotocol/my-endpoint".to_string(),
            delete_header_label: "Delete header".to_string(),
            add_header_label: "Add header".to_string(),
            header_row_selector: ".header-row".to_string(),
            header_key_placeholder: "Header key".to_string(),
            header_value_placeholder: "Header value".to_string(),
            header_switch_selector: ".chakra-switch__input".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Page the handoff tab is opened at.
    pub handoff_url: String,
    /// Delay between guard checks.
    pub poll_interval_ms: u64,
    /// Upper bound on how long one stage waits for its guard.
    pub stage_timeout_ms: u64,
    /// How long the handoff tab may take to report `complete`.
    pub tab_load_timeout_ms: u64,
    /// Run the header stages after the endpoint is filled.
    pub fill_headers: bool,
    pub profile: TargetProfile,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            handoff_url: DEFAULT_HANDOFF_URL.to_string(),
            poll_interval_ms: 100,
            stage_timeout_ms: 5_000,
            tab_load_timeout_ms: 30_000,
            fill_headers: true,
            profile: TargetProfile::default(),
        }
    }
}

impl FlowConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }

    pub fn tab_load_timeout(&self) -> Duration {
        Duration::from_millis(self.tab_load_timeout_ms)
    }
}
