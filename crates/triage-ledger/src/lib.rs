//! # triage-ledger
//!
//! Dedup & audit ledger for the triage pipeline.
//!
//! This crate provides:
//! - An append-only outcome log keyed by `alert_id`, with atomic
//!   append-if-absent for first outcomes
//! - Per-`alert_id` critical sections so concurrent submissions of one alert
//!   cannot both dispatch tickets, without serializing unrelated alerts
//! - Step events recording every pipeline stage (the activity trail)
//! - Memory and JSON Lines file storage
//! - Outcome filters, statistics and incident-pattern summaries
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use triage_ledger::{Ledger, OutcomeFilter};
//! use triage_core::LedgerConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Ledger::open(LedgerConfig::default())?;
//!
//! let _guard = ledger.lock("a-1").await;
//! if let Some(prior) = ledger.check_duplicate("a-1").await? {
//!     println!("already processed as {}", prior.outcome_id);
//! }
//!
//! let recent = ledger.list_outcomes(&OutcomeFilter { limit: Some(10), ..Default::default() }).await?;
//! println!("{} recent outcomes", recent.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod filter;
pub mod keylock;
pub mod ledger;
pub mod stats;
pub mod storage;

pub use error::LedgerError;
pub use event::{StepEvent, StepEventBuilder, StepKind};
pub use filter::OutcomeFilter;
pub use keylock::{KeyGuard, KeyLocks};
pub use ledger::Ledger;
pub use stats::{IncidentPattern, LedgerStats, PatternCount};
pub use storage::{FileStorage, LedgerStorage, MemoryStorage};
