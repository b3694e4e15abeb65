use thiserror::Error;
use triage_core::AlertError;
use triage_ledger::LedgerError;

use crate::capability::LogSearchError;

/// Errors surfaced to callers of the orchestrator.
///
/// Enrichment, reasoning and dispatch failures never appear here; they are
/// absorbed into the outcome.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected before entering the pipeline; nothing was recorded.
    #[error("malformed alert: {0}")]
    MalformedAlert(#[from] AlertError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The fleet-wide scan query itself failed.
    #[error("log scan failed: {0}")]
    Scan(#[from] LogSearchError),

    #[error("pipeline setup failed: {0}")]
    Setup(String),
}
