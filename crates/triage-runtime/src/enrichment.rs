//! Enrichment stage: concurrent log search and asset lookup.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use triage_core::{Alert, AssetRecord, Capability, EnrichedContext, EnrichmentConfig, LogLine};

use crate::capability::{
    AssetDirectory, AssetLookupError, Capabilities, LogSearch, LogSearchError,
};

/// Timing and failure of one enrichment call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallReport {
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

/// Context plus per-source reports, for the activity trail.
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub context: EnrichedContext,
    pub logs: CallReport,
    pub asset: CallReport,
}

/// Builds an [`EnrichedContext`] for an alert.
///
/// Never fails: a source that errors or exceeds its timeout is recorded in
/// `enrichment_errors` and the other source's data is kept.
pub struct Enricher {
    log_search: Arc<dyn LogSearch>,
    asset_directory: Arc<dyn AssetDirectory>,
    timeout: Duration,
    window: Duration,
    max_log_lines: usize,
}

impl Enricher {
    pub fn new(capabilities: &Capabilities, config: &EnrichmentConfig) -> Self {
        Self {
            log_search: capabilities.log_search.clone(),
            asset_directory: capabilities.asset_directory.clone(),
            timeout: config.timeout(),
            window: config.log_window(),
            max_log_lines: config.max_log_lines,
        }
    }

    pub async fn enrich(&self, alert: &Alert) -> Enrichment {
        let (logs, asset) = tokio::join!(
            self.search_logs(&alert.host),
            self.lookup_asset(&alert.host)
        );

        let mut context = EnrichedContext {
            alert_id: alert.alert_id.clone(),
            recent_logs: Vec::new(),
            asset_record: None,
            enrichment_errors: BTreeSet::new(),
        };

        let (logs_result, logs_ms) = logs;
        let logs_report = match logs_result {
            Ok(mut lines) => {
                lines.truncate(self.max_log_lines);
                context.recent_logs = lines;
                CallReport {
                    elapsed_ms: logs_ms,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(
                    alert_id = %alert.alert_id,
                    host = %alert.host,
                    error = %e,
                    "Log search failed, continuing without logs"
                );
                context.enrichment_errors.insert(Capability::LogSearch);
                CallReport {
                    elapsed_ms: logs_ms,
                    error: Some(e.to_string()),
                }
            }
        };

        let (asset_result, asset_ms) = asset;
        let asset_report = match asset_result {
            Ok(record) => {
                context.asset_record = record;
                CallReport {
                    elapsed_ms: asset_ms,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(
                    alert_id = %alert.alert_id,
                    host = %alert.host,
                    error = %e,
                    "Asset lookup failed, continuing without asset record"
                );
                context.enrichment_errors.insert(Capability::AssetDirectory);
                CallReport {
                    elapsed_ms: asset_ms,
                    error: Some(e.to_string()),
                }
            }
        };

        tracing::debug!(
            alert_id = %alert.alert_id,
            log_lines = context.recent_logs.len(),
            asset_known = context.asset_record.is_some(),
            degraded = context.is_degraded(),
            "Enrichment complete"
        );

        Enrichment {
            context,
            logs: logs_report,
            asset: asset_report,
        }
    }

    async fn search_logs(&self, host: &str) -> (Result<Vec<LogLine>, LogSearchError>, u64) {
        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.log_search.query(host, self.window))
            .await
            .unwrap_or(Err(LogSearchError::Timeout));
        (result, elapsed_ms(started))
    }

    async fn lookup_asset(
        &self,
        host: &str,
    ) -> (Result<Option<AssetRecord>, AssetLookupError>, u64) {
        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.asset_directory.lookup(host))
            .await
            .unwrap_or_else(|_| {
                Err(AssetLookupError::Unavailable(format!(
                    "timed out after {}s",
                    self.timeout.as_secs_f64()
                )))
            });
        (result, elapsed_ms(started))
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u64::MAX as u128) as u64
}
