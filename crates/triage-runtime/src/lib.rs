//! # triage-runtime
//!
//! The alert-to-ticket pipeline:
//!
//! 1. **Enrichment**: log search and asset lookup run concurrently, each
//!    under its own timeout; failures degrade the context instead of failing
//!    the alert.
//! 2. **Decision**: a single reasoner call, validated against the verdict
//!    schema, with a deterministic rule table as the safety net.
//! 3. **Dispatch**: every ticketing backend is called concurrently with
//!    bounded exponential backoff for transient failures.
//! 4. **Record**: the outcome is appended to the ledger while the alert's
//!    per-key lock is held, so resubmissions never dispatch twice.
//!
//! [`Scanner`] feeds the same pipeline from a fleet-wide log search, raising
//! one alert per host that logged errors.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use triage_core::{Alert, Severity, TriageConfig};
//! use triage_ledger::Ledger;
//! use triage_runtime::Orchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TriageConfig::default();
//! let ledger = Arc::new(Ledger::open(config.ledger.clone())?);
//! let orchestrator = Orchestrator::from_config(&config, ledger)?;
//!
//! let alert = Alert::new("a-1", "prod-web-01", Severity::High)
//!     .with_message("Memory usage at 97%");
//! let outcome = orchestrator.process_alert(alert).await?;
//! println!("{} tickets", outcome.tickets.len());
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod decision;
pub mod dispatch;
pub mod enrichment;
pub mod error;
pub mod fallback;
pub mod orchestrator;
pub mod scan;
pub mod ticket;

pub use capability::{
    AnalysisRequest, AssetDirectory, AssetLookupError, Capabilities, ConfiguredSink, LogSearch,
    LogSearchError, Reasoner, ReasonerError, ScanHit, TicketError, TicketSink,
};
pub use decision::{Decision, DecisionEngine};
pub use dispatch::DispatchCoordinator;
pub use enrichment::{CallReport, Enricher, Enrichment};
pub use error::PipelineError;
pub use fallback::RuleTable;
pub use orchestrator::Orchestrator;
pub use scan::{AffectedHost, ScanReport, ScanStatus, ScannedAlert, Scanner};
pub use ticket::TicketDraft;
