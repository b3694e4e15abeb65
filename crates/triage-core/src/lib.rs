//! # triage-core
//!
//! Shared data model and configuration for the alert-to-ticket pipeline.
//!
//! The types follow the life of one alert:
//!
//! | Type | Produced by |
//! |------|-------------|
//! | [`Alert`] | the caller, validated on entry |
//! | [`EnrichedContext`] | the enrichment stage |
//! | [`Verdict`] | the decision stage (reasoner or rule fallback) |
//! | [`TicketRecord`] | the dispatch stage, one per configured backend |
//! | [`Outcome`] | the orchestrator, appended to the ledger |

pub mod alert;
pub mod config;
pub mod context;
pub mod outcome;
pub mod severity;
pub mod verdict;

pub use alert::{Alert, AlertError};
pub use config::{
    BackendConfig, CapabilityConfig, CapabilityMode, ConfigError, DispatchConfig,
    EnrichmentConfig, FallbackConfig, LedgerBackend, LedgerConfig, MockBehavior, ReasonerConfig,
    RetryConfig, ScanConfig, TicketKind, TriageConfig,
};
pub use context::{AssetRecord, Capability, EnrichedContext, LogLine};
pub use outcome::{Outcome, TicketRecord, TicketStatus};
pub use severity::{ParseSeverityError, Severity};
pub use verdict::{FallbackReason, Verdict, VerdictSource};
