//! Enrichment context gathered for an alert.

use crate::severity::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single log line returned by log search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl LogLine {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            level: None,
            message: message.into(),
            source: None,
        }
    }

    /// Error-level line, or a message mentioning an error.
    pub fn is_error(&self) -> bool {
        let level_error = self
            .level
            .as_deref()
            .map(|l| l.eq_ignore_ascii_case("error") || l.eq_ignore_ascii_case("fatal"))
            .unwrap_or(false);
        level_error || self.message.to_ascii_lowercase().contains("error")
    }
}

/// Ownership and placement of an asset, as known by the asset directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub hostname: String,
    pub owner_team: String,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Business criticality of the asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criticality: Option<Severity>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// The external capabilities the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    LogSearch,
    AssetDirectory,
    Reasoner,
    TicketSink,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogSearch => write!(f, "log_search"),
            Self::AssetDirectory => write!(f, "asset_directory"),
            Self::Reasoner => write!(f, "reasoner"),
            Self::TicketSink => write!(f, "ticket_sink"),
        }
    }
}

/// Context assembled for one alert by the enrichment stage.
///
/// References the originating alert by id. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedContext {
    pub alert_id: String,
    /// Recent log lines for the host, oldest first. Possibly empty.
    #[serde(default)]
    pub recent_logs: Vec<LogLine>,
    /// Absent when the host is unknown or the directory failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_record: Option<AssetRecord>,
    /// Capabilities that failed while enriching.
    #[serde(default)]
    pub enrichment_errors: BTreeSet<Capability>,
}

impl EnrichedContext {
    /// Context with no data and both enrichment sources marked failed.
    pub fn degraded(alert_id: impl Into<String>) -> Self {
        Self {
            alert_id: alert_id.into(),
            recent_logs: Vec::new(),
            asset_record: None,
            enrichment_errors: [Capability::LogSearch, Capability::AssetDirectory]
                .into_iter()
                .collect(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.enrichment_errors.is_empty()
    }

    pub fn error_line_count(&self) -> usize {
        self.recent_logs.iter().filter(|l| l.is_error()).count()
    }
}
