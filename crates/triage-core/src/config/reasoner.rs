//! Reasoner (language model) configuration.

use super::capability::CapabilityConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerConfig {
    /// Client selection and connection settings.
    #[serde(flatten)]
    pub client: CapabilityConfig,

    /// Model name sent to the provider.
    #[serde(default = "default_model")]
    pub model: String,

    /// Timeout for the single analyze call, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Maximum log lines included in the prompt.
    #[serde(default = "default_prompt_log_lines")]
    pub prompt_log_lines: usize,
}

impl ReasonerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            client: CapabilityConfig::default(),
            model: default_model(),
            timeout_seconds: default_timeout_seconds(),
            prompt_log_lines: default_prompt_log_lines(),
        }
    }
}

fn default_model() -> String {
    "triage-default".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_prompt_log_lines() -> usize {
    10
}
