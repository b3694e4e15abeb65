//! Fleet-wide log scan configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for `triage scan`: one log search across every host, turning
/// each host with errors into an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Search expression selecting error lines.
    #[serde(default = "default_query")]
    pub query: String,

    /// How far back to scan, in minutes.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u64,

    /// Upper bound on matched lines requested from log search.
    #[serde(default = "default_max_events")]
    pub max_events: usize,

    /// Timeout for the scan query, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl ScanConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_minutes * 60)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            query: default_query(),
            window_minutes: default_window_minutes(),
            max_events: default_max_events(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_query() -> String {
    "(error OR exception OR failed OR fatal OR timeout)".to_string()
}

fn default_window_minutes() -> u64 {
    24 * 60
}

fn default_max_events() -> usize {
    1000
}

fn default_timeout_seconds() -> u64 {
    30
}
