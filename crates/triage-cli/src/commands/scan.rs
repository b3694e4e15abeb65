//! `triage scan` - raise alerts for every host with recent errors.

use anyhow::Result;
use std::sync::Arc;
use triage_core::{ScanConfig, TriageConfig};
use triage_ledger::Ledger;
use triage_runtime::{Capabilities, Orchestrator, ScanReport, Scanner};

use super::open_ledger;

/// Command-line overrides for the `scan` section.
#[derive(Debug, Default)]
pub struct ScanOverrides {
    pub window_minutes: Option<u64>,
    pub query: Option<String>,
    pub max_events: Option<usize>,
}

impl ScanOverrides {
    fn apply(self, config: &ScanConfig) -> ScanConfig {
        let mut config = config.clone();
        if let Some(minutes) = self.window_minutes {
            config.window_minutes = minutes;
        }
        if let Some(query) = self.query {
            config.query = query;
        }
        if let Some(max) = self.max_events {
            config.max_events = max;
        }
        config
    }
}

pub async fn run(config: &TriageConfig, overrides: ScanOverrides) -> Result<()> {
    let mut config = config.clone();
    config.scan = overrides.apply(&config.scan);
    config.validate()?;

    let ledger = open_ledger(&config)?;
    let report = scan(&config, ledger.clone()).await;
    ledger.close().await?;
    let report = report?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    eprintln!(
        "events={} hosts={} processed={} failed={}",
        report.total_error_events, report.affected_hosts, report.processed, report.failed
    );
    Ok(())
}

pub(crate) async fn scan(config: &TriageConfig, ledger: Arc<Ledger>) -> Result<ScanReport> {
    let capabilities = Capabilities::from_config(config)?;
    let scanner = Scanner::from_capabilities(&capabilities, &config.scan);
    let orchestrator = Orchestrator::with_capabilities(config, capabilities, ledger)?;

    tracing::info!(
        window_minutes = config.scan.window_minutes,
        query = %config.scan.query,
        "Scanning logs for errors"
    );
    Ok(scanner.scan(&orchestrator).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{BackendConfig, CapabilityConfig, MockBehavior, Severity, TicketStatus};
    use triage_ledger::OutcomeFilter;
    use triage_runtime::ScanStatus;

    #[test]
    fn overrides_replace_only_given_fields() {
        let base = ScanConfig::default();
        let merged = ScanOverrides {
            window_minutes: Some(60),
            ..Default::default()
        }
        .apply(&base);
        assert_eq!(merged.window_minutes, 60);
        assert_eq!(merged.query, base.query);
        assert_eq!(merged.max_events, base.max_events);
    }

    #[tokio::test]
    async fn mock_scan_files_tickets_per_host() {
        let mut config = TriageConfig::default();
        config.dispatch.backends = vec![BackendConfig::new(
            "jira",
            CapabilityConfig::mock(MockBehavior::Succeed),
        )];
        let ledger = Arc::new(Ledger::in_memory());

        let report = scan(&config, ledger.clone()).await.unwrap();
        assert_eq!(report.affected_hosts, 3);
        assert_eq!(report.processed, 3);
        let db = report.alerts.iter().find(|a| a.host == "prod-db-01").unwrap();
        assert_eq!(db.severity, Severity::Critical);
        assert!(matches!(
            db.status,
            ScanStatus::Processed { tickets_created: 1, .. }
        ));

        let outcomes = ledger.list_outcomes(&OutcomeFilter::default()).await.unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.count_status(TicketStatus::Created) == 1));
    }

    #[tokio::test]
    async fn offline_log_search_fails_the_scan() {
        let mut config = TriageConfig::default();
        config.enrichment.log_search = CapabilityConfig::mock(MockBehavior::Unavailable);
        let ledger = Arc::new(Ledger::in_memory());

        assert!(scan(&config, ledger.clone()).await.is_err());
        assert!(ledger
            .list_outcomes(&OutcomeFilter::default())
            .await
            .unwrap()
            .is_empty());
    }
}
