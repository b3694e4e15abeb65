//! Enrichment stage configuration.

use super::capability::CapabilityConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for log search and asset lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Timeout applied to each enrichment call independently, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// How far back to search logs, in minutes.
    #[serde(default = "default_log_window_minutes")]
    pub log_window_minutes: u64,

    /// Search expression passed to log search.
    #[serde(default = "default_log_query")]
    pub log_query: String,

    /// Maximum number of log lines kept in the context.
    #[serde(default = "default_max_log_lines")]
    pub max_log_lines: usize,

    /// Log search client.
    #[serde(default)]
    pub log_search: CapabilityConfig,

    /// Asset directory client.
    #[serde(default)]
    pub asset_directory: CapabilityConfig,
}

impl EnrichmentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn log_window(&self) -> Duration {
        Duration::from_secs(self.log_window_minutes * 60)
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            log_window_minutes: default_log_window_minutes(),
            log_query: default_log_query(),
            max_log_lines: default_max_log_lines(),
            log_search: CapabilityConfig::default(),
            asset_directory: CapabilityConfig::default(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    20
}

fn default_log_window_minutes() -> u64 {
    30
}

fn default_log_query() -> String {
    "(error OR exception OR failed)".to_string()
}

fn default_max_log_lines() -> usize {
    50
}
