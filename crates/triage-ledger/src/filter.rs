//! Outcome query filters.

use chrono::{DateTime, Utc};
use triage_core::{Outcome, Severity, VerdictSource};

/// Filter for listing outcomes.
#[derive(Debug, Clone, Default)]
pub struct OutcomeFilter {
    /// Filter by alert ID.
    pub alert_id: Option<String>,
    /// Filter by host.
    pub host: Option<String>,
    /// Filter by where the verdict came from.
    pub source: Option<VerdictSource>,
    /// Only outcomes whose verdict priority is at least this level.
    pub min_priority: Option<Severity>,
    /// Filter by duplicate flag.
    pub is_duplicate: Option<bool>,
    /// Filter by start time (inclusive).
    pub start_time: Option<DateTime<Utc>>,
    /// Filter by end time (inclusive).
    pub end_time: Option<DateTime<Utc>>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
    /// Oldest first when false. Defaults to newest first.
    pub newest_first: Option<bool>,
}

impl OutcomeFilter {
    pub fn for_alert(alert_id: impl Into<String>) -> Self {
        Self {
            alert_id: Some(alert_id.into()),
            newest_first: Some(false),
            ..Default::default()
        }
    }

    pub fn matches(&self, outcome: &Outcome) -> bool {
        if let Some(ref alert_id) = self.alert_id {
            if outcome.alert.alert_id != *alert_id {
                return false;
            }
        }
        if let Some(ref host) = self.host {
            if outcome.alert.host != *host {
                return false;
            }
        }
        if let Some(source) = self.source {
            if outcome.verdict.source != source {
                return false;
            }
        }
        if let Some(min) = self.min_priority {
            if outcome.verdict.priority < min {
                return false;
            }
        }
        if let Some(dup) = self.is_duplicate {
            if outcome.is_duplicate != dup {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if outcome.processed_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if outcome.processed_at > end {
                return false;
            }
        }
        true
    }

    /// Filter, order and paginate outcomes held in append order.
    pub fn apply<'a>(&self, outcomes: impl DoubleEndedIterator<Item = &'a Outcome>) -> Vec<Outcome> {
        let matching: Vec<&Outcome> = if self.newest_first.unwrap_or(true) {
            outcomes.rev().filter(|o| self.matches(o)).collect()
        } else {
            outcomes.filter(|o| self.matches(o)).collect()
        };

        matching
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{Alert, EnrichedContext, FallbackReason, Verdict};

    fn outcome(id: &str, host: &str, priority: Severity, source: VerdictSource) -> Outcome {
        let verdict = match source {
            VerdictSource::Reasoner => Verdict::from_reasoner(priority, priority, "SRE", "", 0.8),
            VerdictSource::RuleFallback => Verdict::from_rules(
                priority,
                priority,
                "Operations",
                "",
                FallbackReason::ReasonerUnavailable,
            ),
        };
        Outcome::new(
            Alert::new(id, host, priority),
            EnrichedContext::degraded(id),
            verdict,
            Vec::new(),
            0,
        )
    }

    #[test]
    fn filters_by_fields() {
        let all = vec![
            outcome("a-1", "h1", Severity::Low, VerdictSource::Reasoner),
            outcome("a-2", "h2", Severity::High, VerdictSource::RuleFallback),
            outcome("a-3", "h1", Severity::Critical, VerdictSource::Reasoner),
        ];

        let filter = OutcomeFilter {
            host: Some("h1".into()),
            ..Default::default()
        };
        let ids: Vec<_> = filter.apply(all.iter()).into_iter().map(|o| o.alert.alert_id).collect();
        assert_eq!(ids, vec!["a-3", "a-1"]);

        let filter = OutcomeFilter {
            min_priority: Some(Severity::High),
            source: Some(VerdictSource::Reasoner),
            ..Default::default()
        };
        let ids: Vec<_> = filter.apply(all.iter()).into_iter().map(|o| o.alert.alert_id).collect();
        assert_eq!(ids, vec!["a-3"]);
    }

    #[test]
    fn paginates_in_requested_order() {
        let all: Vec<_> = (0..5)
            .map(|i| outcome(&format!("a-{i}"), "h", Severity::Medium, VerdictSource::Reasoner))
            .collect();

        let filter = OutcomeFilter {
            newest_first: Some(false),
            offset: Some(1),
            limit: Some(2),
            ..Default::default()
        };
        let ids: Vec<_> = filter.apply(all.iter()).into_iter().map(|o| o.alert.alert_id).collect();
        assert_eq!(ids, vec!["a-1", "a-2"]);
    }
}
