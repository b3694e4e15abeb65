use std::sync::Arc;
use std::time::Duration;
use triage_core::{BackendConfig, CapabilityMode, MockBehavior, TriageConfig};

use super::http::{HttpAssetDirectory, HttpLogSearch, HttpReasoner, HttpTicketSink};
use super::mock::{MockAssetDirectory, MockLogSearch, MockReasoner, MockTicketSink};
use super::{AssetDirectory, LogSearch, Reasoner, TicketSink};
use crate::error::PipelineError;

/// A ticket sink plus the per-backend settings dispatch needs.
#[derive(Clone)]
pub struct ConfiguredSink {
    pub sink: Arc<dyn TicketSink>,
    pub enabled: bool,
    pub timeout: Duration,
}

impl ConfiguredSink {
    pub fn new(sink: Arc<dyn TicketSink>, timeout: Duration) -> Self {
        Self {
            sink,
            enabled: true,
            timeout,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn name(&self) -> &str {
        self.sink.name()
    }
}

/// The concrete capability set chosen at construction time.
#[derive(Clone)]
pub struct Capabilities {
    pub log_search: Arc<dyn LogSearch>,
    pub asset_directory: Arc<dyn AssetDirectory>,
    /// `None` when the reasoner is disabled; every verdict is then rule-derived.
    pub reasoner: Option<Arc<dyn Reasoner>>,
    pub sinks: Vec<ConfiguredSink>,
}

impl Capabilities {
    /// Mocks everywhere, no ticketing backends.
    pub fn mocks() -> Self {
        Self {
            log_search: Arc::new(MockLogSearch::default()),
            asset_directory: Arc::new(MockAssetDirectory::default()),
            reasoner: Some(Arc::new(MockReasoner::default())),
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: ConfiguredSink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Build each capability in the mode its config selects.
    pub fn from_config(config: &TriageConfig) -> Result<Self, PipelineError> {
        let enrichment = &config.enrichment;

        let log_search: Arc<dyn LogSearch> = match enrichment.log_search.mode {
            CapabilityMode::Http => Arc::new(
                HttpLogSearch::new(
                    &enrichment.log_search,
                    enrichment.log_query.clone(),
                    enrichment.max_log_lines,
                    enrichment.timeout(),
                )
                .map_err(|e| setup_error("log_search", e))?,
            ),
            CapabilityMode::Mock => Arc::new(MockLogSearch::new(
                enrichment.log_search.behavior.clone(),
            )),
            CapabilityMode::Disabled => Arc::new(MockLogSearch::new(MockBehavior::Unavailable)),
        };

        let asset_directory: Arc<dyn AssetDirectory> = match enrichment.asset_directory.mode {
            CapabilityMode::Http => Arc::new(
                HttpAssetDirectory::new(&enrichment.asset_directory, enrichment.timeout())
                    .map_err(|e| setup_error("asset_directory", e))?,
            ),
            CapabilityMode::Mock => Arc::new(MockAssetDirectory::new(
                enrichment.asset_directory.behavior.clone(),
            )),
            CapabilityMode::Disabled => {
                Arc::new(MockAssetDirectory::new(MockBehavior::Unavailable))
            }
        };

        let reasoner_config = &config.reasoner;
        let reasoner: Option<Arc<dyn Reasoner>> = match reasoner_config.client.mode {
            CapabilityMode::Http => Some(Arc::new(
                HttpReasoner::new(
                    &reasoner_config.client,
                    reasoner_config.model.clone(),
                    reasoner_config.timeout(),
                )
                .map_err(|e| setup_error("reasoner", e))?,
            )),
            CapabilityMode::Mock => Some(Arc::new(MockReasoner::new(
                reasoner_config.client.behavior.clone(),
            ))),
            CapabilityMode::Disabled => None,
        };

        let sinks = config
            .dispatch
            .backends
            .iter()
            .map(build_sink)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            log_search,
            asset_directory,
            reasoner,
            sinks,
        })
    }
}

fn build_sink(backend: &BackendConfig) -> Result<ConfiguredSink, PipelineError> {
    let sink: Arc<dyn TicketSink> = match backend.client.mode {
        CapabilityMode::Http => {
            Arc::new(HttpTicketSink::new(backend).map_err(|e| setup_error(&backend.name, e))?)
        }
        CapabilityMode::Mock => {
            let mut mock = MockTicketSink::new(&backend.name, backend.client.behavior.clone());
            if let Some(project) = &backend.project {
                mock = mock.with_prefix(project);
            }
            Arc::new(mock)
        }
        CapabilityMode::Disabled => {
            return Err(PipelineError::Setup(format!(
                "backend '{}': use `enabled: false` to switch a backend off",
                backend.name
            )));
        }
    };

    let configured = ConfiguredSink::new(sink, backend.timeout());
    Ok(if backend.enabled {
        configured
    } else {
        configured.disabled()
    })
}

fn setup_error(capability: &str, err: reqwest::Error) -> PipelineError {
    PipelineError::Setup(format!("{capability}: failed to build HTTP client: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::CapabilityConfig;

    #[test]
    fn builds_mocks_from_default_config() {
        let mut config = TriageConfig::default();
        config
            .dispatch
            .backends
            .push(BackendConfig::new("jira", CapabilityConfig::default()));
        let mut off = BackendConfig::new("servicenow", CapabilityConfig::default());
        off.enabled = false;
        config.dispatch.backends.push(off);

        let caps = Capabilities::from_config(&config).unwrap();
        assert!(caps.reasoner.is_some());
        assert_eq!(caps.sinks.len(), 2);
        assert_eq!(caps.sinks[0].name(), "jira");
        assert!(caps.sinks[0].enabled);
        assert!(!caps.sinks[1].enabled);
    }

    #[test]
    fn disabled_reasoner_is_absent() {
        let mut config = TriageConfig::default();
        config.reasoner.client.mode = CapabilityMode::Disabled;
        let caps = Capabilities::from_config(&config).unwrap();
        assert!(caps.reasoner.is_none());
    }
}
