//! The process-wide ledger handle.
//!
//! [`Ledger`] is created once at start-up, shared behind an `Arc`, and
//! closed at shutdown. All reads and writes go through it.

use std::sync::Arc;
use triage_core::{LedgerConfig, Outcome};

use crate::error::LedgerError;
use crate::event::StepEvent;
use crate::filter::OutcomeFilter;
use crate::keylock::{KeyGuard, KeyLocks};
use crate::stats::LedgerStats;
use crate::storage::{create_storage, LedgerStorage, MemoryStorage};

/// Dedup & audit ledger.
pub struct Ledger {
    config: LedgerConfig,
    storage: Arc<dyn LedgerStorage>,
    locks: KeyLocks,
}

impl Ledger {
    /// Open the ledger described by `config`.
    pub fn open(config: LedgerConfig) -> Result<Self, LedgerError> {
        let storage: Arc<dyn LedgerStorage> = Arc::from(create_storage(&config)?);
        Ok(Self::with_storage(config, storage))
    }

    /// Create a ledger with a custom storage backend.
    pub fn with_storage(config: LedgerConfig, storage: Arc<dyn LedgerStorage>) -> Self {
        Self {
            config,
            storage,
            locks: KeyLocks::new(),
        }
    }

    /// Create a memory-only ledger.
    pub fn in_memory() -> Self {
        Self::with_storage(LedgerConfig::default(), Arc::new(MemoryStorage::new()))
    }

    /// Enter the critical section for `alert_id`.
    ///
    /// Hold the guard from the duplicate check until the outcome is appended.
    pub async fn lock(&self, alert_id: &str) -> KeyGuard {
        self.locks.acquire(alert_id).await
    }

    /// Prior outcome for this alert, if it has already been processed.
    pub async fn check_duplicate(&self, alert_id: &str) -> Result<Option<Outcome>, LedgerError> {
        self.storage.first_outcome(alert_id).await
    }

    /// Append a terminal outcome. The only mutator of the outcome log.
    pub async fn append(&self, outcome: Outcome) -> Result<(), LedgerError> {
        tracing::debug!(
            outcome_id = %outcome.outcome_id,
            alert_id = %outcome.alert_id(),
            duplicate = outcome.is_duplicate,
            tickets = outcome.tickets.len(),
            "Appending outcome"
        );
        self.storage.append(outcome).await
    }

    /// First outcome recorded for `alert_id`.
    pub async fn get_outcome(&self, alert_id: &str) -> Result<Option<Outcome>, LedgerError> {
        self.storage.first_outcome(alert_id).await
    }

    /// Query outcomes with filters.
    pub async fn list_outcomes(&self, filter: &OutcomeFilter) -> Result<Vec<Outcome>, LedgerError> {
        self.storage.outcomes(filter).await
    }

    /// Record a step event.
    ///
    /// Best effort: a failed write is logged and does not fail the pipeline.
    pub async fn record(&self, event: StepEvent) {
        tracing::debug!(
            event_id = %event.event_id,
            alert_id = %event.alert_id,
            step = %event.step,
            "Step event"
        );

        if self.config.stdout {
            println!("{}", event.to_log_line());
        }

        if let Err(e) = self.storage.record_event(event).await {
            tracing::warn!(error = %e, "Failed to record step event");
        }
    }

    /// Step events for an alert, in the order they happened.
    pub async fn events_for(&self, alert_id: &str) -> Result<Vec<StepEvent>, LedgerError> {
        self.storage.events(alert_id).await
    }

    /// Aggregate statistics over outcomes matching `filter`.
    pub async fn stats(&self, filter: &OutcomeFilter) -> Result<LedgerStats, LedgerError> {
        let outcomes = self.storage.outcomes(filter).await?;
        Ok(LedgerStats::from_outcomes(&outcomes))
    }

    /// Flush storage. Call once at shutdown.
    pub async fn close(&self) -> Result<(), LedgerError> {
        self.storage.flush().await?;
        tracing::info!("Ledger closed");
        Ok(())
    }
}
