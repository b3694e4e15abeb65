//! Fleet-wide error scan.
//!
//! A single log search across every host. Each host with matching lines
//! becomes an `auto-scan-*` alert that runs through the normal pipeline, so
//! scan alerts get the same enrichment, verdicts, tickets and ledger entries
//! as submitted ones.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use triage_core::{Alert, ScanConfig, Severity, TicketStatus};
use uuid::Uuid;

use crate::capability::{Capabilities, LogSearch, LogSearchError, ScanHit};
use crate::error::PipelineError;
use crate::orchestrator::Orchestrator;

/// Sample messages carried in an alert's metadata.
const SAMPLE_MESSAGES: usize = 5;
const SAMPLE_MESSAGE_CHARS: usize = 200;
const LATEST_MESSAGE_CHARS: usize = 100;

const CRITICAL_KEYWORDS: [&str; 4] = ["critical", "fatal", "panic", "outage"];
const HIGH_KEYWORDS: [&str; 3] = ["high", "severe", "major"];

/// Severity suggested by a log message, if any keyword matches.
pub fn keyword_severity(message: &str) -> Option<Severity> {
    let lower = message.to_lowercase();
    if CRITICAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Some(Severity::Critical)
    } else if HIGH_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Some(Severity::High)
    } else {
        None
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Matched lines for one host.
#[derive(Debug, Clone, PartialEq)]
pub struct AffectedHost {
    pub host: String,
    pub error_count: usize,
    /// Highest keyword severity seen, Medium when nothing matched.
    pub severity: Severity,
    /// First few messages, truncated.
    pub samples: Vec<String>,
    pub latest_message: String,
    pub latest_at: Option<DateTime<Utc>>,
}

impl AffectedHost {
    fn new(host: String) -> Self {
        Self {
            host,
            error_count: 0,
            severity: Severity::Medium,
            samples: Vec::new(),
            latest_message: String::new(),
            latest_at: None,
        }
    }

    fn add(&mut self, hit: &ScanHit) {
        self.error_count += 1;
        if self.samples.len() < SAMPLE_MESSAGES {
            self.samples.push(truncate(&hit.line.message, SAMPLE_MESSAGE_CHARS));
        }
        if let Some(severity) = keyword_severity(&hit.line.message) {
            self.severity = self.severity.max(severity);
        }
        // Untimestamped lines count as newer than nothing, older than anything dated.
        let newer = match (hit.line.timestamp, self.latest_at) {
            (Some(at), Some(latest)) => at >= latest,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => true,
        };
        if newer {
            self.latest_at = hit.line.timestamp;
            self.latest_message = hit.line.message.clone();
        }
    }

    /// The alert raised for this host.
    pub fn to_alert(&self, window_minutes: u64, now: DateTime<Utc>) -> Alert {
        let window = window_label(window_minutes);
        Alert::new(
            format!("auto-scan-{}-{}", self.host, now.timestamp()),
            self.host.clone(),
            self.severity,
        )
        .with_message(format!(
            "Multiple errors detected on {}: {} errors in the last {}. Latest: {}",
            self.host,
            self.error_count,
            window,
            truncate(&self.latest_message, LATEST_MESSAGE_CHARS)
        ))
        .with_timestamp(now)
        .with_metadata("scan_source", "log_scan")
        .with_metadata("error_count", self.error_count.to_string())
        .with_metadata("time_range", window)
        .with_metadata("error_messages", self.samples.join("\n"))
    }
}

fn window_label(minutes: u64) -> String {
    if minutes % 60 == 0 {
        format!("{}h", minutes / 60)
    } else {
        format!("{}m", minutes)
    }
}

/// Group hits by host, ordered by host name. Blank hosts become "unknown".
pub fn group_by_host(hits: &[ScanHit]) -> Vec<AffectedHost> {
    let mut hosts: BTreeMap<String, AffectedHost> = BTreeMap::new();
    for hit in hits {
        let host = match hit.host.trim() {
            "" => "unknown",
            host => host,
        };
        hosts
            .entry(host.to_string())
            .or_insert_with(|| AffectedHost::new(host.to_string()))
            .add(hit);
    }
    hosts.into_values().collect()
}

/// What happened to one scan alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanStatus {
    Processed {
        outcome_id: Uuid,
        is_duplicate: bool,
        tickets_created: usize,
        tickets_failed: usize,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannedAlert {
    pub alert_id: String,
    pub host: String,
    pub severity: Severity,
    pub error_count: usize,
    #[serde(flatten)]
    pub status: ScanStatus,
}

/// Result of one scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub window_minutes: u64,
    pub total_error_events: usize,
    pub affected_hosts: usize,
    pub processed: usize,
    pub failed: usize,
    pub alerts: Vec<ScannedAlert>,
}

/// Runs scans against a log search capability.
pub struct Scanner {
    log_search: Arc<dyn LogSearch>,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(log_search: Arc<dyn LogSearch>, config: ScanConfig) -> Self {
        Self { log_search, config }
    }

    pub fn from_capabilities(capabilities: &Capabilities, config: &ScanConfig) -> Self {
        Self::new(capabilities.log_search.clone(), config.clone())
    }

    /// Search for errors and process one alert per affected host.
    ///
    /// Only a failed search is an error. Alerts the pipeline rejects are
    /// reported as failed and the remaining hosts are still processed.
    #[tracing::instrument(skip_all, fields(window_minutes = self.config.window_minutes))]
    pub async fn scan(&self, orchestrator: &Orchestrator) -> Result<ScanReport, PipelineError> {
        let search = self.log_search.scan(
            &self.config.query,
            self.config.window(),
            self.config.max_events,
        );
        let hits = match tokio::time::timeout(self.config.timeout(), search).await {
            Ok(result) => result?,
            Err(_) => return Err(LogSearchError::Timeout.into()),
        };

        let hosts = group_by_host(&hits);
        tracing::info!(events = hits.len(), hosts = hosts.len(), "Scan found affected hosts");

        let now = Utc::now();
        let mut report = ScanReport {
            window_minutes: self.config.window_minutes,
            total_error_events: hits.len(),
            affected_hosts: hosts.len(),
            processed: 0,
            failed: 0,
            alerts: Vec::with_capacity(hosts.len()),
        };

        for host in hosts {
            let alert = host.to_alert(self.config.window_minutes, now);
            let alert_id = alert.alert_id.clone();
            tracing::info!(alert_id = %alert_id, host = %host.host, "Processing scan alert");

            let status = match orchestrator.process_alert(alert).await {
                Ok(outcome) => {
                    report.processed += 1;
                    ScanStatus::Processed {
                        outcome_id: outcome.outcome_id,
                        is_duplicate: outcome.is_duplicate,
                        tickets_created: outcome.count_status(TicketStatus::Created),
                        tickets_failed: outcome.count_status(TicketStatus::Failed),
                    }
                }
                Err(e) => {
                    tracing::error!(alert_id = %alert_id, error = %e, "Scan alert failed");
                    report.failed += 1;
                    ScanStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.alerts.push(ScannedAlert {
                alert_id,
                host: host.host,
                severity: host.severity,
                error_count: host.error_count,
                status,
            });
        }

        Ok(report)
    }
}
