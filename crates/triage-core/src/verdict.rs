//! Triage verdicts.

use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerdictSource {
    Reasoner,
    RuleFallback,
}

impl fmt::Display for VerdictSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reasoner => write!(f, "reasoner"),
            Self::RuleFallback => write!(f, "rule_fallback"),
        }
    }
}

/// Why the rule table was used instead of the reasoner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No reasoner is configured.
    ReasonerDisabled,
    ReasonerUnavailable,
    ReasonerTimeout,
    RateLimited,
    /// The reasoner answered with something that was not a verdict.
    InvalidResponse,
    /// The answer parsed but broke the verdict schema.
    SchemaViolation,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ReasonerDisabled => "reasoner_disabled",
            Self::ReasonerUnavailable => "reasoner_unavailable",
            Self::ReasonerTimeout => "reasoner_timeout",
            Self::RateLimited => "rate_limited",
            Self::InvalidResponse => "invalid_response",
            Self::SchemaViolation => "schema_violation",
        };
        f.write_str(s)
    }
}

/// The triage decision for one alert. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub severity: Severity,
    pub priority: Severity,
    pub assignment_group: String,
    pub rationale: String,
    pub source: VerdictSource,
    /// Reasoner confidence in `0.0..=1.0`. Only set for reasoner verdicts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Only set for rule fallback verdicts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

impl Verdict {
    pub fn from_reasoner(
        severity: Severity,
        priority: Severity,
        assignment_group: impl Into<String>,
        rationale: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            severity,
            priority,
            assignment_group: assignment_group.into(),
            rationale: rationale.into(),
            source: VerdictSource::Reasoner,
            confidence: Some(confidence.clamp(0.0, 1.0)),
            fallback_reason: None,
        }
    }

    pub fn from_rules(
        severity: Severity,
        priority: Severity,
        assignment_group: impl Into<String>,
        rationale: impl Into<String>,
        reason: FallbackReason,
    ) -> Self {
        Self {
            severity,
            priority,
            assignment_group: assignment_group.into(),
            rationale: rationale.into(),
            source: VerdictSource::RuleFallback,
            confidence: None,
            fallback_reason: Some(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == VerdictSource::RuleFallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoner_confidence_is_clamped() {
        let v = Verdict::from_reasoner(Severity::High, Severity::High, "SRE", "", 1.7);
        assert_eq!(v.confidence, Some(1.0));
        assert!(!v.is_fallback());
    }

    #[test]
    fn fallback_verdict_is_tagged() {
        let v = Verdict::from_rules(
            Severity::Medium,
            Severity::Medium,
            "Operations",
            "default",
            FallbackReason::ReasonerTimeout,
        );
        assert!(v.is_fallback());
        assert_eq!(v.confidence, None);

        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["source"], "RuleFallback");
        assert_eq!(json["fallback_reason"], "reasoner_timeout");
    }
}
