//! `triage process` - run a batch of alerts through the pipeline.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::future::Future;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use triage_core::{Alert, Outcome, TicketStatus, TriageConfig};
use triage_runtime::{Orchestrator, PipelineError};

use super::open_ledger;

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Summary {
    pub processed: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub tickets_created: usize,
    pub tickets_failed: usize,
    /// Alerts never started because the run was interrupted.
    pub not_started: usize,
}

impl Summary {
    fn add(&mut self, outcome: &Outcome) {
        self.processed += 1;
        if outcome.is_duplicate {
            self.duplicates += 1;
        }
        self.tickets_created += outcome.count_status(TicketStatus::Created);
        self.tickets_failed += outcome.count_status(TicketStatus::Failed);
    }
}

/// Alerts parsed from input plus the number of lines that did not parse.
#[derive(Debug)]
pub(crate) struct Batch {
    pub alerts: Vec<Alert>,
    pub unparsed: usize,
}

pub async fn run(config: &TriageConfig, input: &Path, concurrency: usize) -> Result<()> {
    let batch = parse_alerts(&read_input(input)?)?;
    let ledger = open_ledger(config)?;
    let orchestrator = Orchestrator::from_config(config, ledger.clone())?;

    tracing::info!(
        alerts = batch.alerts.len(),
        unparsed = batch.unparsed,
        concurrency,
        "Processing alerts"
    );

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let result = process_all(&orchestrator, batch.alerts, concurrency, shutdown).await;

    ledger.close().await?;
    let mut summary = result?;
    summary.rejected += batch.unparsed;

    eprintln!(
        "processed={} duplicates={} rejected={} tickets_created={} tickets_failed={} not_started={}",
        summary.processed,
        summary.duplicates,
        summary.rejected,
        summary.tickets_created,
        summary.tickets_failed,
        summary.not_started
    );
    Ok(())
}

/// Process `alerts` with at most `concurrency` in flight.
///
/// When `shutdown` resolves no further alerts are started, but alerts already
/// in flight run to completion so their outcomes reach the ledger.
pub(crate) async fn process_all(
    orchestrator: &Orchestrator,
    alerts: Vec<Alert>,
    concurrency: usize,
    shutdown: impl Future<Output = ()>,
) -> Result<Summary> {
    let total = alerts.len();
    let stopping = AtomicBool::new(false);
    let mut summary = Summary::default();

    let mut results = futures::stream::iter(alerts)
        .take_while(|_| futures::future::ready(!stopping.load(Ordering::SeqCst)))
        .map(|alert| orchestrator.process_alert(alert))
        .buffer_unordered(concurrency.max(1));

    tokio::pin!(shutdown);
    let mut interrupted = false;
    loop {
        let next = tokio::select! {
            result = results.next() => result,
            _ = &mut shutdown, if !interrupted => {
                interrupted = true;
                stopping.store(true, Ordering::SeqCst);
                tracing::warn!("Interrupted; finishing alerts already in flight");
                continue;
            }
        };
        let Some(result) = next else {
            break;
        };

        match result {
            Ok(outcome) => {
                summary.add(&outcome);
                println!("{}", serde_json::to_string(&outcome)?);
            }
            Err(PipelineError::MalformedAlert(e)) => {
                tracing::error!(error = %e, "Rejected alert");
                summary.rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    summary.not_started = total - summary.processed - summary.rejected;
    Ok(summary)
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read alerts from stdin")?;
        Ok(content)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read alerts from {}", path.display()))
    }
}

/// Accepts a JSON array of alerts or one alert per line.
pub(crate) fn parse_alerts(content: &str) -> Result<Batch> {
    let mut batch = Batch {
        alerts: Vec::new(),
        unparsed: 0,
    };

    if content.trim_start().starts_with('[') {
        let items: Vec<serde_json::Value> =
            serde_json::from_str(content).context("Failed to parse alert array")?;
        for (idx, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<Alert>(item) {
                Ok(alert) => batch.alerts.push(alert),
                Err(e) => {
                    tracing::error!(index = idx, error = %e, "Skipping unparseable alert");
                    batch.unparsed += 1;
                }
            }
        }
        return Ok(batch);
    }

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Alert>(line) {
            Ok(alert) => batch.alerts.push(alert),
            Err(e) => {
                tracing::error!(line = idx + 1, error = %e, "Skipping unparseable alert");
                batch.unparsed += 1;
            }
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use triage_core::{BackendConfig, CapabilityConfig, MockBehavior, Severity};
    use triage_ledger::{Ledger, OutcomeFilter};

    #[test]
    fn parses_arrays_and_json_lines() {
        let array = r#"[{"alert_id": "a-1", "host": "h1", "severity": "High"}]"#;
        let batch = parse_alerts(array).unwrap();
        assert_eq!(batch.alerts.len(), 1);
        assert_eq!(batch.alerts[0].severity_hint, Severity::High);

        // One bad element only rejects that element.
        let mixed = r#"[
            {"alert_id": "a-1", "host": "h1", "severity": "High"},
            {"alert_id": "a-2", "severity": "Low"}
        ]"#;
        let batch = parse_alerts(mixed).unwrap();
        assert_eq!(batch.alerts.len(), 1);
        assert_eq!(batch.alerts[0].alert_id, "a-1");
        assert_eq!(batch.unparsed, 1);

        let lines = "{\"alert_id\": \"a-1\", \"host\": \"h1\", \"severity_hint\": \"Low\"}\n\nnot json\n";
        let batch = parse_alerts(lines).unwrap();
        assert_eq!(batch.alerts.len(), 1);
        assert_eq!(batch.unparsed, 1);
    }

    #[tokio::test]
    async fn batch_counts_duplicates_and_rejections() {
        let config = TriageConfig::default();
        let orchestrator =
            Orchestrator::from_config(&config, Arc::new(Ledger::in_memory())).unwrap();
        let alerts = vec![
            Alert::new("a-1", "prod-web-01", Severity::High),
            Alert::new("a-2", "", Severity::High),
        ];

        let first = process_all(&orchestrator, alerts, 2, std::future::pending())
            .await
            .unwrap();
        assert_eq!(first.processed, 1);
        assert_eq!(first.rejected, 1);

        let again = process_all(
            &orchestrator,
            vec![Alert::new("a-1", "prod-web-01", Severity::High)],
            1,
            std::future::pending(),
        )
        .await
        .unwrap();
        assert_eq!(again.duplicates, 1);
    }

    #[tokio::test]
    async fn interrupt_finishes_alerts_in_flight() {
        let mut config = TriageConfig::default();
        config.dispatch.backends = vec![BackendConfig::new(
            "jira",
            CapabilityConfig::mock(MockBehavior::Delay { ms: 200 }),
        )];
        let ledger = Arc::new(Ledger::in_memory());
        let orchestrator = Orchestrator::from_config(&config, ledger.clone()).unwrap();
        let alerts: Vec<Alert> = (0..6)
            .map(|i| Alert::new(format!("a-{i}"), "prod-web-01", Severity::High))
            .collect();

        let shutdown = tokio::time::sleep(Duration::from_millis(50));
        let summary = process_all(&orchestrator, alerts, 2, shutdown).await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.tickets_created, 2);
        assert_eq!(summary.not_started, 4);

        let recorded = ledger.list_outcomes(&OutcomeFilter::default()).await.unwrap();
        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().all(|o| o.count_status(TicketStatus::Created) == 1));
    }
}
