//! CLI command implementations.

pub mod check;
pub mod demo;
pub mod process;
pub mod query;
pub mod scan;

use std::sync::Arc;
use triage_core::{LedgerBackend, TriageConfig};
use triage_ledger::Ledger;

/// Open the configured ledger, warning when it cannot hold prior runs.
pub(crate) fn open_ledger(config: &TriageConfig) -> anyhow::Result<Arc<Ledger>> {
    if config.ledger.backend == LedgerBackend::Memory {
        tracing::warn!("Memory ledger selected: outcomes are lost when the process exits");
    }
    Ok(Arc::new(Ledger::open(config.ledger.clone())?))
}
