//! Pipeline step events.
//!
//! Every stage of an alert's pipeline leaves a step event in the ledger,
//! forming the activity trail for that alert. Events are append-only and
//! grouped by `alert_id`; the events of one run share a `correlation_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline step recorded by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    // ===== Intake =====
    /// Alert accepted into the pipeline.
    AlertReceived,
    /// Alert identity already has an outcome.
    DuplicateDetected,

    // ===== Enrichment =====
    LogsRetrieved,
    LogsFailed,
    AssetResolved,
    /// Asset directory answered but has no record of the host.
    AssetUnknown,
    AssetFailed,

    // ===== Decision =====
    VerdictReasoned,
    VerdictFallback,

    // ===== Dispatch =====
    TicketCreated,
    TicketFailed,
    TicketSkipped,

    // ===== Terminal =====
    OutcomeRecorded,
}

impl StepKind {
    /// Whether the step represents a degradation or failure.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::LogsFailed | Self::AssetFailed | Self::VerdictFallback | Self::TicketFailed
        )
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlertReceived => write!(f, "ALERT_RECEIVED"),
            Self::DuplicateDetected => write!(f, "DUPLICATE_DETECTED"),
            Self::LogsRetrieved => write!(f, "LOGS_RETRIEVED"),
            Self::LogsFailed => write!(f, "LOGS_FAILED"),
            Self::AssetResolved => write!(f, "ASSET_RESOLVED"),
            Self::AssetUnknown => write!(f, "ASSET_UNKNOWN"),
            Self::AssetFailed => write!(f, "ASSET_FAILED"),
            Self::VerdictReasoned => write!(f, "VERDICT_REASONED"),
            Self::VerdictFallback => write!(f, "VERDICT_FALLBACK"),
            Self::TicketCreated => write!(f, "TICKET_CREATED"),
            Self::TicketFailed => write!(f, "TICKET_FAILED"),
            Self::TicketSkipped => write!(f, "TICKET_SKIPPED"),
            Self::OutcomeRecorded => write!(f, "OUTCOME_RECORDED"),
        }
    }
}

/// A single step event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// When the step happened.
    pub occurred_at: DateTime<Utc>,

    /// Alert the step belongs to.
    pub alert_id: String,

    pub step: StepKind,

    /// Human-readable detail, e.g. "Found 15 log lines".
    pub detail: String,

    /// Ticketing backend (dispatch steps only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    /// Attempt number (dispatch steps only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,

    /// Error message for failure steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Time spent in the step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Groups the events of one pipeline run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// Additional structured data.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl StepEvent {
    pub fn new(step: StepKind, alert_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            alert_id: alert_id.into(),
            step,
            detail: detail.into(),
            backend: None,
            attempt: None,
            error: None,
            duration_ms: None,
            correlation_id: None,
            meta: serde_json::Value::Null,
        }
    }

    pub fn builder(
        step: StepKind,
        alert_id: impl Into<String>,
        detail: impl Into<String>,
    ) -> StepEventBuilder {
        StepEventBuilder {
            event: Self::new(step, alert_id, detail),
        }
    }

    /// Format the event as a human-readable log line.
    ///
    /// Format: `[timestamp] STEP alert=... detail="..." [backend=...] [error="..."]`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {} alert={} detail=\"{}\"",
            self.occurred_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.step,
            self.alert_id,
            self.detail.replace('"', "'"),
        );

        if let Some(ref backend) = self.backend {
            line.push_str(&format!(" backend={}", backend));
        }
        if let Some(attempt) = self.attempt {
            line.push_str(&format!(" attempt={}", attempt));
        }
        if let Some(duration) = self.duration_ms {
            line.push_str(&format!(" duration_ms={}", duration));
        }
        if let Some(ref error) = self.error {
            line.push_str(&format!(" error=\"{}\"", error.replace('"', "'")));
        }

        line
    }
}

/// Builder for step events.
#[derive(Debug)]
pub struct StepEventBuilder {
    event: StepEvent,
}

impl StepEventBuilder {
    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.event.backend = Some(backend.into());
        self
    }

    pub fn attempt(mut self, attempt: u32) -> Self {
        self.event.attempt = Some(attempt);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.event.error = Some(error.into());
        self
    }

    pub fn duration_ms(mut self, duration: u64) -> Self {
        self.event.duration_ms = Some(duration);
        self
    }

    pub fn correlation_id(mut self, id: Uuid) -> Self {
        self.event.correlation_id = Some(id);
        self
    }

    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.event.meta = meta;
        self
    }

    pub fn build(self) -> StepEvent {
        self.event
    }
}
