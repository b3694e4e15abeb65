//! Ticket dispatch configuration.

use super::capability::CapabilityConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ticketing backends and the retry policy applied to each of them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DispatchConfig {
    #[serde(default)]
    pub retry: RetryConfig,

    /// Configured backends, in dispatch order.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

/// Bounded exponential backoff for transient ticketing failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(32) as i32;
        let ms = self.initial_backoff_ms as f64 * self.multiplier.powi(exp);
        Duration::from_millis(ms.min(self.max_backoff_ms as f64) as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Kind of ticket a backend creates. Shapes the request body of live clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketKind {
    /// Issue-tracker ticket (project, summary, description, priority).
    #[default]
    Issue,
    /// Incident record (short description, urgency, impact).
    Incident,
}

/// One ticketing backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Unique name, recorded on every ticket record.
    pub name: String,

    /// Disabled backends are recorded as skipped.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub kind: TicketKind,

    /// Project or queue the ticket is filed under.
    #[serde(default)]
    pub project: Option<String>,

    /// Timeout for each createTicket attempt, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(flatten)]
    pub client: CapabilityConfig,
}

impl BackendConfig {
    pub fn new(name: impl Into<String>, client: CapabilityConfig) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            kind: TicketKind::default(),
            project: None,
            timeout_seconds: default_timeout_seconds(),
            client,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_timeout_seconds() -> u64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff(1), Duration::from_millis(200));
        assert_eq!(retry.backoff(2), Duration::from_millis(400));
        assert_eq!(retry.backoff(3), Duration::from_millis(800));
        assert_eq!(retry.backoff(10), Duration::from_millis(5_000));
    }
}
