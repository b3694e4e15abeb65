//! External capabilities consumed by the pipeline.
//!
//! Each capability is an async trait with a mock and an HTTP implementation.
//! Failures are typed per capability so the pipeline can decide whether to
//! degrade, fall back, or retry.

pub mod http;
pub mod mock;
mod registry;

pub use registry::{Capabilities, ConfiguredSink};

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use triage_core::{Alert, AssetRecord, EnrichedContext, LogLine, Verdict};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LogSearchError {
    #[error("log search unavailable: {0}")]
    Unavailable(String),

    #[error("log search timed out")]
    Timeout,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssetLookupError {
    #[error("asset directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReasonerError {
    #[error("reasoner unavailable: {0}")]
    Unavailable(String),

    #[error("reasoner returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("reasoner rate limited")]
    RateLimited,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TicketError {
    /// Worth retrying (5xx, timeouts, connection resets).
    #[error("transient ticketing failure: {0}")]
    Transient(String),

    /// Will fail again (4xx, rejected payloads).
    #[error("permanent ticketing failure: {0}")]
    Permanent(String),
}

impl TicketError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A line matched by a fleet-wide scan, with the host that logged it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScanHit {
    #[serde(default = "unknown_host")]
    pub host: String,
    #[serde(flatten)]
    pub line: LogLine,
}

impl ScanHit {
    pub fn new(host: impl Into<String>, line: LogLine) -> Self {
        Self {
            host: host.into(),
            line,
        }
    }
}

fn unknown_host() -> String {
    "unknown".to_string()
}

#[async_trait]
pub trait LogSearch: Send + Sync {
    /// Recent log lines for a host.
    async fn query(&self, host: &str, window: Duration) -> Result<Vec<LogLine>, LogSearchError>;

    /// Lines matching `query` across every host, at most `limit` of them.
    async fn scan(
        &self,
        query: &str,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<ScanHit>, LogSearchError>;
}

/// Asset metadata for a host. `Ok(None)` means the directory has no record.
#[async_trait]
pub trait AssetDirectory: Send + Sync {
    async fn lookup(&self, host: &str) -> Result<Option<AssetRecord>, AssetLookupError>;
}

/// Input handed to a [`Reasoner`].
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub alert: &'a Alert,
    pub context: &'a EnrichedContext,
    /// Rendered prompt for text-completion reasoners.
    pub prompt: &'a str,
}

/// Produces an unvalidated verdict document for an alert.
///
/// The returned JSON is validated against the verdict schema by the caller;
/// implementations should not attempt to repair it.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<serde_json::Value, ReasonerError>;
}

/// A ticketing backend. Returns the external ticket ID.
#[async_trait]
pub trait TicketSink: Send + Sync {
    fn name(&self) -> &str;

    async fn create_ticket(
        &self,
        alert: &Alert,
        context: &EnrichedContext,
        verdict: &Verdict,
    ) -> Result<String, TicketError>;
}
