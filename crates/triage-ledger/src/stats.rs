//! Aggregate views over recorded outcomes.

use serde::Serialize;
use std::collections::BTreeMap;
use triage_core::{Outcome, Severity, TicketStatus, VerdictSource};

/// Coarse incident category derived from the alert message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentPattern {
    MemoryPressure,
    DatabaseConnection,
    DiskSpace,
    Timeout,
    Other,
}

impl IncidentPattern {
    pub fn classify(message: &str) -> Self {
        let m = message.to_ascii_lowercase();
        if m.contains("memory") || m.contains("oom") {
            Self::MemoryPressure
        } else if m.contains("database") || m.contains("connection") {
            Self::DatabaseConnection
        } else if m.contains("disk") {
            Self::DiskSpace
        } else if m.contains("timeout") || m.contains("timed out") {
            Self::Timeout
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternCount {
    pub pattern: IncidentPattern,
    pub count: usize,
}

/// Summary of the ledger contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerStats {
    pub total_outcomes: usize,
    pub duplicates: usize,
    pub reasoner_verdicts: usize,
    pub fallback_verdicts: usize,
    pub tickets_created: usize,
    pub tickets_failed: usize,
    pub tickets_skipped: usize,
    /// Mean processing time of first (non-duplicate) outcomes.
    pub mean_processing_ms: f64,
    pub by_priority: BTreeMap<Severity, usize>,
    /// Most frequent first.
    pub patterns: Vec<PatternCount>,
}

impl LedgerStats {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let mut stats = Self {
            total_outcomes: outcomes.len(),
            ..Default::default()
        };

        let mut processing_total = 0u64;
        let mut patterns: BTreeMap<IncidentPattern, usize> = BTreeMap::new();

        for outcome in outcomes {
            if outcome.is_duplicate {
                stats.duplicates += 1;
                continue;
            }

            match outcome.verdict.source {
                VerdictSource::Reasoner => stats.reasoner_verdicts += 1,
                VerdictSource::RuleFallback => stats.fallback_verdicts += 1,
            }
            stats.tickets_created += outcome.count_status(TicketStatus::Created);
            stats.tickets_failed += outcome.count_status(TicketStatus::Failed);
            stats.tickets_skipped += outcome.count_status(TicketStatus::Skipped);
            processing_total += outcome.processing_ms;

            *stats.by_priority.entry(outcome.verdict.priority).or_default() += 1;
            *patterns
                .entry(IncidentPattern::classify(&outcome.alert.message))
                .or_default() += 1;
        }

        let firsts = stats.total_outcomes - stats.duplicates;
        if firsts > 0 {
            stats.mean_processing_ms = processing_total as f64 / firsts as f64;
        }

        stats.patterns = patterns
            .into_iter()
            .map(|(pattern, count)| PatternCount { pattern, count })
            .collect();
        // Stable sort keeps the enum order between equal counts.
        stats.patterns.sort_by(|a, b| b.count.cmp(&a.count));

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{Alert, EnrichedContext, FallbackReason, TicketRecord, Verdict};

    fn outcome(id: &str, message: &str, source: VerdictSource, tickets: Vec<TicketRecord>) -> Outcome {
        let verdict = match source {
            VerdictSource::Reasoner => {
                Verdict::from_reasoner(Severity::High, Severity::High, "SRE", "", 0.9)
            }
            VerdictSource::RuleFallback => Verdict::from_rules(
                Severity::Medium,
                Severity::Medium,
                "Operations",
                "",
                FallbackReason::ReasonerTimeout,
            ),
        };
        Outcome::new(
            Alert::new(id, "h1", Severity::High).with_message(message),
            EnrichedContext::degraded(id),
            verdict,
            tickets,
            10,
        )
    }

    #[test]
    fn classifies_messages() {
        assert_eq!(IncidentPattern::classify("Memory usage at 95%"), IncidentPattern::MemoryPressure);
        assert_eq!(IncidentPattern::classify("DB connection pool exhausted"), IncidentPattern::DatabaseConnection);
        assert_eq!(IncidentPattern::classify("Disk /var at 99%"), IncidentPattern::DiskSpace);
        assert_eq!(IncidentPattern::classify("upstream request timed out"), IncidentPattern::Timeout);
        assert_eq!(IncidentPattern::classify("cert expires soon"), IncidentPattern::Other);
    }

    #[test]
    fn aggregates_outcomes() {
        let first = outcome(
            "a-1",
            "memory leak",
            VerdictSource::Reasoner,
            vec![
                TicketRecord::created("jira", "OPS-1", 1),
                TicketRecord::failed("servicenow", "denied", 1),
            ],
        );
        let dup = Outcome::duplicate_of(&first, first.alert.clone(), 0);
        let second = outcome(
            "a-2",
            "memory pressure",
            VerdictSource::RuleFallback,
            vec![TicketRecord::skipped("jira")],
        );
        let third = outcome("a-3", "disk full", VerdictSource::Reasoner, Vec::new());

        let stats = LedgerStats::from_outcomes(&[first, dup, second, third]);

        assert_eq!(stats.total_outcomes, 4);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.reasoner_verdicts, 2);
        assert_eq!(stats.fallback_verdicts, 1);
        assert_eq!(stats.tickets_created, 1);
        assert_eq!(stats.tickets_failed, 1);
        assert_eq!(stats.tickets_skipped, 1);
        assert_eq!(stats.mean_processing_ms, 10.0);
        assert_eq!(stats.by_priority.get(&Severity::High), Some(&2));
        assert_eq!(
            stats.patterns[0],
            PatternCount {
                pattern: IncidentPattern::MemoryPressure,
                count: 2
            }
        );
    }
}
