//! Deterministic in-process capabilities.
//!
//! Every mock follows a [`MockBehavior`] script so tests and demos can
//! exercise degraded paths without live services.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use triage_core::{
    Alert, AssetRecord, EnrichedContext, LogLine, MockBehavior, Severity, Verdict,
};

use super::{
    AnalysisRequest, AssetDirectory, AssetLookupError, LogSearch, LogSearchError, Reasoner,
    ReasonerError, ScanHit, TicketError, TicketSink,
};

const SYNTHETIC_LOG_LINES: u32 = 15;

/// Hosts reporting errors in a synthesized scan.
const SCAN_HOSTS: [&str; 3] = ["prod-web-01", "prod-web-02", "prod-db-01"];

/// What a scripted call should do.
enum Step {
    Proceed,
    Transient(String),
    Permanent(String),
    Unavailable,
    Malformed,
}

/// Call counter plus the configured behavior.
#[derive(Debug)]
struct Script {
    behavior: MockBehavior,
    calls: AtomicU32,
}

impl Script {
    fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicU32::new(0),
        }
    }

    async fn next(&self) -> Step {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.behavior {
            MockBehavior::Succeed => Step::Proceed,
            MockBehavior::FailTransient { times } if call <= *times => {
                Step::Transient(format!("simulated transient failure {call}/{times}"))
            }
            MockBehavior::FailTransient { .. } => Step::Proceed,
            MockBehavior::FailPermanent { message } => Step::Permanent(message.clone()),
            MockBehavior::Unavailable => Step::Unavailable,
            MockBehavior::Malformed => Step::Malformed,
            MockBehavior::Delay { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Step::Proceed
            }
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Log search
// ============================================================================

/// Synthesizes application logs for any host.
///
/// Every third line is a memory-usage error, the rest are checkpoints, spread
/// evenly across the requested window.
#[derive(Debug)]
pub struct MockLogSearch {
    script: Script,
    lines: Option<Vec<LogLine>>,
    scan_hits: Option<Vec<ScanHit>>,
}

impl MockLogSearch {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            script: Script::new(behavior),
            lines: None,
            scan_hits: None,
        }
    }

    /// Return `lines` instead of synthesized logs.
    pub fn with_lines(mut self, lines: Vec<LogLine>) -> Self {
        self.lines = Some(lines);
        self
    }

    /// Return `hits` from scans instead of synthesized errors.
    pub fn with_scan_hits(mut self, hits: Vec<ScanHit>) -> Self {
        self.scan_hits = Some(hits);
        self
    }

    pub fn calls(&self) -> u32 {
        self.script.calls()
    }

    /// Error lines of [`SCAN_HOSTS`], plus one fatal line for the database.
    fn synthesize_scan(window: Duration) -> Vec<ScanHit> {
        let mut hits: Vec<ScanHit> = SCAN_HOSTS
            .iter()
            .flat_map(|host| {
                Self::synthesize(host, window)
                    .into_iter()
                    .filter(LogLine::is_error)
                    .map(move |line| ScanHit::new(*host, line))
            })
            .collect();

        let mut fatal = LogLine::new("[prod-db-01] FATAL: connection pool exhausted");
        fatal.timestamp = Some(Utc::now());
        fatal.level = Some("ERROR".to_string());
        hits.push(ScanHit::new("prod-db-01", fatal));
        hits
    }

    fn synthesize(host: &str, window: Duration) -> Vec<LogLine> {
        let now = Utc::now();
        let spacing = window / SYNTHETIC_LOG_LINES;

        (0..SYNTHETIC_LOG_LINES)
            .map(|i| {
                let age = chrono::Duration::from_std(spacing * i)
                    .unwrap_or_else(|_| chrono::Duration::zero());
                let (level, message) = if i % 3 == 0 {
                    ("ERROR", format!("[{host}] Memory usage at {}%", 85 + i))
                } else {
                    ("INFO", format!("[{host}] Normal operation checkpoint {i}"))
                };
                LogLine {
                    timestamp: Some(now - age),
                    level: Some(level.to_string()),
                    message,
                    source: Some("/var/log/app/app.log".to_string()),
                }
            })
            .collect()
    }
}

impl Default for MockLogSearch {
    fn default() -> Self {
        Self::new(MockBehavior::Succeed)
    }
}

#[async_trait]
impl LogSearch for MockLogSearch {
    async fn query(&self, host: &str, window: Duration) -> Result<Vec<LogLine>, LogSearchError> {
        match self.script.next().await {
            Step::Proceed => Ok(self
                .lines
                .clone()
                .unwrap_or_else(|| Self::synthesize(host, window))),
            Step::Transient(msg) | Step::Permanent(msg) => Err(LogSearchError::Unavailable(msg)),
            Step::Unavailable => Err(LogSearchError::Unavailable("log search offline".into())),
            Step::Malformed => Err(LogSearchError::Unavailable(
                "malformed log search response".into(),
            )),
        }
    }

    async fn scan(
        &self,
        _query: &str,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<ScanHit>, LogSearchError> {
        match self.script.next().await {
            Step::Proceed => {
                let mut hits = self
                    .scan_hits
                    .clone()
                    .unwrap_or_else(|| Self::synthesize_scan(window));
                hits.truncate(limit);
                Ok(hits)
            }
            Step::Transient(msg) | Step::Permanent(msg) => Err(LogSearchError::Unavailable(msg)),
            Step::Unavailable => Err(LogSearchError::Unavailable("log search offline".into())),
            Step::Malformed => Err(LogSearchError::Unavailable(
                "malformed log search response".into(),
            )),
        }
    }
}

// ============================================================================
// Asset directory
// ============================================================================

/// In-memory asset inventory.
#[derive(Debug)]
pub struct MockAssetDirectory {
    script: Script,
    inventory: HashMap<String, AssetRecord>,
}

impl MockAssetDirectory {
    /// Directory seeded with the demo inventory.
    pub fn new(behavior: MockBehavior) -> Self {
        Self::with_inventory(behavior, demo_inventory())
    }

    pub fn with_inventory(
        behavior: MockBehavior,
        records: impl IntoIterator<Item = AssetRecord>,
    ) -> Self {
        Self {
            script: Script::new(behavior),
            inventory: records
                .into_iter()
                .map(|r| (r.hostname.clone(), r))
                .collect(),
        }
    }

    pub fn calls(&self) -> u32 {
        self.script.calls()
    }
}

impl Default for MockAssetDirectory {
    fn default() -> Self {
        Self::new(MockBehavior::Succeed)
    }
}

#[async_trait]
impl AssetDirectory for MockAssetDirectory {
    async fn lookup(&self, host: &str) -> Result<Option<AssetRecord>, AssetLookupError> {
        match self.script.next().await {
            Step::Proceed => Ok(self.inventory.get(host).cloned()),
            Step::Transient(msg) | Step::Permanent(msg) => Err(AssetLookupError::Unavailable(msg)),
            Step::Unavailable => Err(AssetLookupError::Unavailable(
                "asset directory offline".into(),
            )),
            Step::Malformed => Err(AssetLookupError::Unavailable(
                "malformed asset record".into(),
            )),
        }
    }
}

/// Hosts known to the mock directory.
pub fn demo_inventory() -> Vec<AssetRecord> {
    let record = |host: &str, service: &str, team: &str, criticality: Severity, deps: &[&str]| AssetRecord {
        hostname: host.to_string(),
        owner_team: team.to_string(),
        environment: "Production".to_string(),
        service: Some(service.to_string()),
        criticality: Some(criticality),
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
    };

    vec![
        record(
            "prod-web-01",
            "Payment Gateway",
            "Payment Team",
            Severity::High,
            &["prod-db-01", "prod-cache-01"],
        ),
        record(
            "prod-web-02",
            "Order Service",
            "Order Team",
            Severity::Critical,
            &["prod-db-02", "prod-mq-01"],
        ),
        record(
            "prod-web-03",
            "Payment Gateway",
            "Payment Team",
            Severity::High,
            &["prod-db-01", "prod-cache-01"],
        ),
        AssetRecord {
            environment: "Staging".to_string(),
            ..record(
                "stg-web-01",
                "Payment Gateway",
                "Payment Team",
                Severity::Medium,
                &["stg-db-01"],
            )
        },
    ]
}

// ============================================================================
// Reasoner
// ============================================================================

/// Rule-of-thumb reasoner, or a fixed scripted answer.
///
/// Without a script it echoes the severity hint, raises priority for critical
/// production assets and routes to the owner team.
#[derive(Debug)]
pub struct MockReasoner {
    script: Script,
    response: Option<serde_json::Value>,
}

impl MockReasoner {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            script: Script::new(behavior),
            response: None,
        }
    }

    /// Always answer with `response` (when the behavior lets the call through).
    pub fn scripted(response: serde_json::Value) -> Self {
        Self {
            script: Script::new(MockBehavior::Succeed),
            response: Some(response),
        }
    }

    pub fn calls(&self) -> u32 {
        self.script.calls()
    }

    fn heuristic(request: &AnalysisRequest<'_>) -> serde_json::Value {
        let alert = request.alert;
        let asset = request.context.asset_record.as_ref();

        let priority = match asset.and_then(|a| a.criticality) {
            Some(c) if c >= Severity::Critical => alert.severity_hint.escalate(),
            _ => alert.severity_hint,
        };
        let group = asset
            .map(|a| a.owner_team.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or("SRE");

        json!({
            "severity": alert.severity_hint.as_str(),
            "priority": priority.as_str(),
            "assignment_group": group,
            "rationale": format!(
                "{} error lines in recent logs; alert reported: {}",
                request.context.error_line_count(),
                alert.message
            ),
            "confidence": 0.75,
        })
    }
}

impl Default for MockReasoner {
    fn default() -> Self {
        Self::new(MockBehavior::Succeed)
    }
}

#[async_trait]
impl Reasoner for MockReasoner {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<serde_json::Value, ReasonerError> {
        match self.script.next().await {
            Step::Proceed => Ok(self
                .response
                .clone()
                .unwrap_or_else(|| Self::heuristic(&request))),
            Step::Transient(_) => Err(ReasonerError::RateLimited),
            Step::Permanent(msg) => Err(ReasonerError::InvalidResponse(msg)),
            Step::Unavailable => Err(ReasonerError::Unavailable("reasoner offline".into())),
            // Parses as JSON but violates the verdict schema.
            Step::Malformed => Ok(json!({
                "severity": "Severe",
                "priority": null,
                "confidence": 7,
            })),
        }
    }
}

// ============================================================================
// Ticket sink
// ============================================================================

/// Issues sequential ticket keys such as `OPS-1001`.
#[derive(Debug)]
pub struct MockTicketSink {
    name: String,
    prefix: String,
    script: Script,
    sequence: AtomicU64,
}

impl MockTicketSink {
    pub fn new(name: impl Into<String>, behavior: MockBehavior) -> Self {
        let name = name.into();
        let prefix = name
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(4)
            .collect::<String>()
            .to_ascii_uppercase();
        Self {
            name,
            prefix,
            script: Script::new(behavior),
            sequence: AtomicU64::new(1000),
        }
    }

    /// Use `prefix` for ticket keys instead of one derived from the name.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn calls(&self) -> u32 {
        self.script.calls()
    }
}

#[async_trait]
impl TicketSink for MockTicketSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_ticket(
        &self,
        alert: &Alert,
        _context: &EnrichedContext,
        verdict: &Verdict,
    ) -> Result<String, TicketError> {
        match self.script.next().await {
            Step::Proceed => {
                let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                let key = format!("{}-{}", self.prefix, n);
                tracing::debug!(
                    backend = %self.name,
                    ticket = %key,
                    alert_id = %alert.alert_id,
                    priority = %verdict.priority,
                    "Mock ticket created"
                );
                Ok(key)
            }
            Step::Transient(msg) => Err(TicketError::Transient(msg)),
            Step::Permanent(msg) => Err(TicketError::Permanent(msg)),
            Step::Unavailable => Err(TicketError::Transient("backend unavailable".into())),
            Step::Malformed => Err(TicketError::Permanent(
                "ticket response missing an ID".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn synthesized_logs_fit_the_window() {
        let search = MockLogSearch::default();
        let window = Duration::from_secs(30 * 60);
        let lines = search.query("prod-web-01", window).await.unwrap();

        assert_eq!(lines.len(), 15);
        assert_eq!(lines.iter().filter(|l| l.is_error()).count(), 5);
        let oldest = lines.last().unwrap().timestamp.unwrap();
        assert!(Utc::now() - oldest <= chrono::Duration::minutes(30));
    }

    #[tokio::test]
    async fn synthesized_scan_covers_several_hosts() {
        let search = MockLogSearch::default();
        let hits = search
            .scan("error", Duration::from_secs(3600), 1000)
            .await
            .unwrap();

        assert!(hits.iter().all(|h| h.line.is_error()));
        for host in SCAN_HOSTS {
            assert!(hits.iter().any(|h| h.host == host));
        }
        assert_eq!(
            search.scan("error", Duration::from_secs(3600), 4).await.unwrap().len(),
            4
        );
        assert!(MockLogSearch::new(MockBehavior::Unavailable)
            .scan("error", Duration::from_secs(3600), 10)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn asset_lookup_distinguishes_unknown_from_failure() {
        let directory = MockAssetDirectory::default();
        let known = directory.lookup("prod-web-02").await.unwrap().unwrap();
        assert_eq!(known.owner_team, "Order Team");
        assert_eq!(known.criticality, Some(Severity::Critical));
        assert!(directory.lookup("nowhere").await.unwrap().is_none());

        let offline = MockAssetDirectory::new(MockBehavior::Unavailable);
        assert!(offline.lookup("prod-web-02").await.is_err());
    }

    #[tokio::test]
    async fn transient_failures_stop_after_configured_count() {
        let sink = MockTicketSink::new("jira", MockBehavior::FailTransient { times: 2 });
        let alert = Alert::new("a-1", "h1", Severity::High);
        let context = EnrichedContext::degraded("a-1");
        let verdict = Verdict::from_reasoner(Severity::High, Severity::High, "SRE", "", 0.9);

        for _ in 0..2 {
            let err = sink.create_ticket(&alert, &context, &verdict).await.unwrap_err();
            assert!(err.is_retryable());
        }
        let key = sink.create_ticket(&alert, &context, &verdict).await.unwrap();
        assert_eq!(key, "JIRA-1001");
        assert_eq!(sink.calls(), 3);
    }

    #[tokio::test]
    async fn heuristic_reasoner_routes_to_owner_team() {
        let reasoner = MockReasoner::default();
        let alert = Alert::new("a-1", "prod-web-02", Severity::High);
        let mut context = EnrichedContext::degraded("a-1");
        context.asset_record = demo_inventory().into_iter().find(|a| a.hostname == "prod-web-02");

        let raw = reasoner
            .analyze(AnalysisRequest {
                alert: &alert,
                context: &context,
                prompt: "",
            })
            .await
            .unwrap();
        assert_eq!(raw["priority"], "Critical");
        assert_eq!(raw["assignment_group"], "Order Team");
    }
}
