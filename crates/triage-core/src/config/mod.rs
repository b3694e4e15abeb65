//! Configuration types for the triage pipeline.
//!
//! Configuration is a single YAML document deserialized into [`TriageConfig`].
//! Every section is optional; missing values fall back to defaults, and the
//! default configuration runs entirely on mock capabilities.
//!
//! ```yaml
//! enrichment:
//!   timeout_seconds: 20
//!   log_search: { mode: http, endpoint: "https://logs.internal/api" }
//! reasoner:
//!   mode: http
//!   endpoint: "https://llm.internal/v1/complete"
//!   credentials_env: TRIAGE_LLM_TOKEN
//! dispatch:
//!   backends:
//!     - { name: jira, mode: http, endpoint: "https://jira.internal", project: OPS }
//!     - { name: servicenow, kind: incident, mode: mock }
//! ledger:
//!   backend: file
//!   directory: /var/lib/triage
//! ```

pub mod capability;
pub mod dispatch;
pub mod enrichment;
pub mod fallback;
pub mod ledger;
pub mod reasoner;
pub mod scan;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub use capability::{CapabilityConfig, CapabilityMode, MockBehavior};
pub use dispatch::{BackendConfig, DispatchConfig, RetryConfig, TicketKind};
pub use enrichment::EnrichmentConfig;
pub use fallback::FallbackConfig;
pub use ledger::{LedgerBackend, LedgerConfig};
pub use reasoner::ReasonerConfig;
pub use scan::ScanConfig;

/// Complete triage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TriageConfig {
    /// Log search and asset lookup.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Language model reasoner.
    #[serde(default)]
    pub reasoner: ReasonerConfig,

    /// Deterministic rule table.
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Ticketing backends and retry policy.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Dedup & audit ledger.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Fleet-wide error scan.
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TriageConfig {
    /// Load and validate configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enrichment.timeout_seconds == 0 {
            return Err(ConfigError::Config(
                "enrichment.timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.reasoner.timeout_seconds == 0 {
            return Err(ConfigError::Config(
                "reasoner.timeout_seconds must be greater than zero".into(),
            ));
        }
        let multiplier = self.dispatch.retry.multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(ConfigError::Config(
                "dispatch.retry.multiplier must be at least 1.0".into(),
            ));
        }

        if self.scan.window_minutes == 0 || self.scan.max_events == 0 {
            return Err(ConfigError::Config(
                "scan.window_minutes and scan.max_events must be greater than zero".into(),
            ));
        }
        if self.scan.timeout_seconds == 0 {
            return Err(ConfigError::Config(
                "scan.timeout_seconds must be greater than zero".into(),
            ));
        }

        require_endpoint("enrichment.log_search", &self.enrichment.log_search)?;
        require_endpoint("enrichment.asset_directory", &self.enrichment.asset_directory)?;
        require_endpoint("reasoner", &self.reasoner.client)?;

        let mut names = HashSet::new();
        for backend in &self.dispatch.backends {
            if backend.name.trim().is_empty() {
                return Err(ConfigError::Config("backend name must not be empty".into()));
            }
            if !names.insert(backend.name.as_str()) {
                return Err(ConfigError::Config(format!(
                    "duplicate backend name '{}'",
                    backend.name
                )));
            }
            if backend.timeout_seconds == 0 {
                return Err(ConfigError::Config(format!(
                    "backend '{}' timeout_seconds must be greater than zero",
                    backend.name
                )));
            }
            if backend.client.mode == CapabilityMode::Disabled {
                return Err(ConfigError::Config(format!(
                    "backend '{}' cannot use mode 'disabled'; set enabled: false instead",
                    backend.name
                )));
            }
            require_endpoint(&format!("dispatch.backends.{}", backend.name), &backend.client)?;
        }

        Ok(())
    }

    /// Names of configured backends, in dispatch order.
    pub fn backend_names(&self) -> Vec<&str> {
        self.dispatch.backends.iter().map(|b| b.name.as_str()).collect()
    }
}

fn require_endpoint(section: &str, client: &CapabilityConfig) -> Result<(), ConfigError> {
    if client.mode == CapabilityMode::Http && client.endpoint.as_deref().unwrap_or("").is_empty() {
        return Err(ConfigError::Config(format!(
            "{section}: mode 'http' requires an endpoint"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;

    #[test]
    fn empty_document_uses_defaults() {
        let config = TriageConfig::from_yaml("{}").unwrap();
        assert_eq!(config.enrichment.timeout_seconds, 20);
        assert_eq!(config.reasoner.timeout_seconds, 30);
        assert_eq!(config.dispatch.retry.max_retries, 3);
        assert_eq!(config.fallback.unknown_host_priority, Severity::Medium);
        assert!(config.dispatch.backends.is_empty());
        assert_eq!(config.ledger.backend, LedgerBackend::Memory);
        assert_eq!(config.scan.window_minutes, 24 * 60);
        assert_eq!(config.scan.max_events, 1000);
    }

    #[test]
    fn parses_full_document() {
        let yaml = r#"
enrichment:
  timeout_seconds: 5
  log_search:
    mode: mock
    behavior: { kind: delay, ms: 250 }
reasoner:
  mode: http
  endpoint: "http://llm.local/complete"
  credentials_env: TRIAGE_TEST_TOKEN
dispatch:
  retry: { max_retries: 1, initial_backoff_ms: 10 }
  backends:
    - name: jira
      project: OPS
    - name: servicenow
      kind: incident
      behavior: { kind: fail_permanent, message: "no access" }
ledger:
  backend: file
  directory: /tmp/triage
"#;
        let config = TriageConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.enrichment.log_search.behavior,
            MockBehavior::Delay { ms: 250 }
        );
        assert_eq!(config.reasoner.client.mode, CapabilityMode::Http);
        assert_eq!(config.backend_names(), vec!["jira", "servicenow"]);
        assert_eq!(config.dispatch.backends[1].kind, TicketKind::Incident);
        assert_eq!(
            config.dispatch.backends[1].client.behavior,
            MockBehavior::FailPermanent {
                message: "no access".into()
            }
        );
        assert_eq!(config.ledger.backend, LedgerBackend::File);
    }

    #[test]
    fn rejects_duplicate_backends() {
        let yaml = "dispatch:\n  backends:\n    - name: jira\n    - name: jira\n";
        let err = TriageConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate backend name"));
    }

    #[test]
    fn http_mode_needs_endpoint() {
        let yaml = "reasoner:\n  mode: http\n";
        assert!(matches!(
            TriageConfig::from_yaml(yaml),
            Err(ConfigError::Config(_))
        ));
    }

    #[test]
    fn retry_multiplier_must_be_a_number_of_at_least_one() {
        let nan = TriageConfig::from_yaml("dispatch:\n  retry:\n    multiplier: .nan\n");
        assert!(matches!(nan, Err(ConfigError::Config(_))));

        let shrinking = TriageConfig::from_yaml("dispatch:\n  retry:\n    multiplier: 0.5\n");
        assert!(matches!(shrinking, Err(ConfigError::Config(_))));

        let config = TriageConfig::from_yaml("dispatch:\n  retry:\n    multiplier: 1.0\n").unwrap();
        assert_eq!(config.dispatch.retry.multiplier, 1.0);
    }

    #[test]
    fn scan_section_is_validated() {
        let config = TriageConfig::from_yaml("scan:\n  window_minutes: 60\n  query: \"fatal\"\n")
            .unwrap();
        assert_eq!(config.scan.window().as_secs(), 3600);
        assert_eq!(config.scan.query, "fatal");

        let err = TriageConfig::from_yaml("scan:\n  max_events: 0\n").unwrap_err();
        assert!(err.to_string().contains("scan.max_events"));
    }
}
