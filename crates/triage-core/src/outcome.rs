//! Ticket records and terminal outcomes.

use crate::alert::Alert;
use crate::context::EnrichedContext;
use crate::verdict::Verdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Terminal state of one backend's ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    Created,
    Failed,
    /// Backend is configured but disabled.
    Skipped,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of dispatching to one ticketing backend.
///
/// `external_id` is set only when `Created`; `error_detail` only when `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub backend_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Number of createTicket calls made, including the successful one.
    #[serde(default)]
    pub attempts: u32,
}

impl TicketRecord {
    pub fn created(backend: impl Into<String>, external_id: impl Into<String>, attempts: u32) -> Self {
        Self {
            backend_name: backend.into(),
            external_id: Some(external_id.into()),
            status: TicketStatus::Created,
            error_detail: None,
            attempts,
        }
    }

    pub fn failed(backend: impl Into<String>, detail: impl Into<String>, attempts: u32) -> Self {
        Self {
            backend_name: backend.into(),
            external_id: None,
            status: TicketStatus::Failed,
            error_detail: Some(detail.into()),
            attempts,
        }
    }

    pub fn skipped(backend: impl Into<String>) -> Self {
        Self {
            backend_name: backend.into(),
            external_id: None,
            status: TicketStatus::Skipped,
            error_detail: None,
            attempts: 0,
        }
    }
}

/// Terminal artifact for one processed alert. Stored append-only.
///
/// A duplicate submission yields a new `Outcome` with `is_duplicate = true`,
/// no tickets, and `duplicate_of` naming the first outcome for the alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub outcome_id: Uuid,
    pub alert: Alert,
    pub context: EnrichedContext,
    pub verdict: Verdict,
    #[serde(default)]
    pub tickets: Vec<TicketRecord>,
    pub is_duplicate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<Uuid>,
    pub processed_at: DateTime<Utc>,
    /// Wall-clock time spent in the pipeline.
    #[serde(default)]
    pub processing_ms: u64,
}

impl Outcome {
    pub fn new(
        alert: Alert,
        context: EnrichedContext,
        verdict: Verdict,
        tickets: Vec<TicketRecord>,
        processing_ms: u64,
    ) -> Self {
        Self {
            outcome_id: Uuid::new_v4(),
            alert,
            context,
            verdict,
            tickets,
            is_duplicate: false,
            duplicate_of: None,
            processed_at: Utc::now(),
            processing_ms,
        }
    }

    /// Outcome for a resubmitted alert. Copies the prior context and verdict.
    pub fn duplicate_of(prior: &Outcome, alert: Alert, processing_ms: u64) -> Self {
        Self {
            outcome_id: Uuid::new_v4(),
            alert,
            context: prior.context.clone(),
            verdict: prior.verdict.clone(),
            tickets: Vec::new(),
            is_duplicate: true,
            duplicate_of: Some(prior.outcome_id),
            processed_at: Utc::now(),
            processing_ms,
        }
    }

    pub fn alert_id(&self) -> &str {
        &self.alert.alert_id
    }

    pub fn count_status(&self, status: TicketStatus) -> usize {
        self.tickets.iter().filter(|t| t.status == status).count()
    }

    /// Every non-skipped backend produced a ticket.
    pub fn fully_ticketed(&self) -> bool {
        self.tickets
            .iter()
            .all(|t| t.status != TicketStatus::Failed)
    }
}
