//! Error types for the ledger crate.

use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Failed to open or load the ledger.
    #[error("failed to initialize ledger: {0}")]
    InitializationFailed(String),

    /// A first outcome for this alert is already recorded.
    #[error("an outcome for alert {alert_id} is already recorded")]
    AlreadyRecorded { alert_id: String },

    /// A duplicate outcome was appended without a prior outcome.
    #[error("duplicate outcome for alert {alert_id} has no prior outcome")]
    MissingPrior { alert_id: String },

    /// An in-memory lock was poisoned by a panicking writer.
    #[error("ledger lock poisoned: {0}")]
    Lock(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
