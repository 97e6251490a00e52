//! Effective configuration of a netclip process.

use handoff_flow::FlowConfig;
use netclip_event_bus::BusConfig;
use network_tap::TapConfig;
use selection_agent::AgentConfig;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const ENV_HANDOFF_URL: &str = "NETCLIP_HANDOFF_URL";
pub const ENV_BUS_TIMEOUT_MS: &str = "NETCLIP_BUS_TIMEOUT_MS";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tap: TapConfig,
    pub bus: BusConfig,
    pub agent: AgentConfig,
    pub flow: FlowConfig,
}

impl Config {
    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), AppError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`; empty values are ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), AppError> {
        if let Some(url) = lookup(ENV_HANDOFF_URL).filter(|v| !v.trim().is_empty()) {
            self.flow.handoff_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_BUS_TIMEOUT_MS).filter(|v| !v.trim().is_empty()) {
            self.bus.request_timeout_ms =
                raw.trim()
                    .parse()
                    .map_err(|_| AppError::InvalidOverride {
                        name: ENV_BUS_TIMEOUT_MS,
                        value: raw.clone(),
                    })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str(
            "flow:\n  stage_timeout_ms: 250\ntap:\n  fetch_bodies: false\n",
        )
        .unwrap();
        assert_eq!(config.flow.stage_timeout_ms, 250);
        assert_eq!(config.flow.handoff_url, handoff_flow::DEFAULT_HANDOFF_URL);
        assert!(!config.tap.fetch_bodies);
        assert_eq!(config.bus, BusConfig::default());
    }

    #[test]
    fn env_overrides_win() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                (ENV_HANDOFF_URL, "http://localhost:3000/new"),
                (ENV_BUS_TIMEOUT_MS, "750"),
            ]))
            .unwrap();
        assert_eq!(config.flow.handoff_url, "http://localhost:3000/new");
        assert_eq!(config.bus.request_timeout_ms, 750);
    }

    #[test]
    fn bad_timeout_override_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(lookup(&[(ENV_BUS_TIMEOUT_MS, "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidOverride { name: ENV_BUS_TIMEOUT_MS, .. }
        ));
    }
}
