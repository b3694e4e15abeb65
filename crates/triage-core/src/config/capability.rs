//! Settings shared by every capability client.

use serde::{Deserialize, Serialize};

/// Which implementation of a capability to construct.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityMode {
    /// Deterministic in-process implementation.
    #[default]
    Mock,
    /// JSON-over-HTTP client.
    Http,
    /// Not configured at all. Only meaningful for the reasoner.
    Disabled,
}

/// Scripted behaviour of a mock capability.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MockBehavior {
    /// Answer normally.
    #[default]
    Succeed,
    /// Fail with a retryable error for the first `times` calls, then succeed.
    FailTransient { times: u32 },
    /// Fail every call with a non-retryable error.
    FailPermanent {
        #[serde(default = "default_failure_message")]
        message: String,
    },
    /// Report the capability as unavailable.
    Unavailable,
    /// Return garbage instead of a well-formed answer.
    Malformed,
    /// Sleep before answering, to exercise timeouts.
    Delay { ms: u64 },
}

/// Connection and selection settings for one capability.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CapabilityConfig {
    /// Implementation to use.
    #[serde(default)]
    pub mode: CapabilityMode,

    /// Base URL for `http` mode.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Environment variable holding a bearer token for `http` mode.
    #[serde(default)]
    pub credentials_env: Option<String>,

    /// Behaviour for `mock` mode.
    #[serde(default)]
    pub behavior: MockBehavior,
}

impl CapabilityConfig {
    pub fn mock(behavior: MockBehavior) -> Self {
        Self {
            mode: CapabilityMode::Mock,
            behavior,
            ..Default::default()
        }
    }

    pub fn http(endpoint: impl Into<String>) -> Self {
        Self {
            mode: CapabilityMode::Http,
            endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }

    /// Resolve the bearer token from `credentials_env`, if any.
    pub fn bearer_token(&self) -> Option<String> {
        self.credentials_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|v| !v.is_empty())
    }
}

fn default_failure_message() -> String {
    "rejected by backend".to_string()
}
