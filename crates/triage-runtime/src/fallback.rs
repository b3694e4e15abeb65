//! Deterministic rule table used when the reasoner cannot decide.

use triage_core::{Alert, EnrichedContext, FallbackConfig, FallbackReason, Severity, Verdict};

/// Rule-based classifier. Always produces a complete verdict.
///
/// | Input | Effect |
/// |-------|--------|
/// | escalation keyword in message | severity at least High |
/// | known asset, criticality >= High | priority = severity |
/// | known asset, lower or no criticality | priority = severity - 1 |
/// | known asset in production | priority + 1 |
/// | unknown host | priority = `unknown_host_priority` (+1 on keyword) |
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    config: FallbackConfig,
}

impl RuleTable {
    pub fn new(config: FallbackConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        alert: &Alert,
        context: &EnrichedContext,
        reason: FallbackReason,
    ) -> Verdict {
        let mut notes = vec![format!("reported severity {}", alert.severity_hint)];

        let keyword = self.config.matched_keyword(&alert.message);
        let mut severity = alert.severity_hint;
        if let Some(keyword) = keyword {
            if severity < Severity::High {
                severity = Severity::High;
            }
            notes.push(format!("message mentions '{keyword}'"));
        }

        let (priority, group) = match &context.asset_record {
            Some(asset) => {
                let criticality = asset.criticality.unwrap_or(Severity::Medium);
                let mut priority = if criticality >= Severity::High {
                    severity
                } else {
                    severity.deescalate()
                };
                notes.push(format!("asset criticality {criticality}"));

                if self.config.is_production(&asset.environment) {
                    priority = priority.escalate();
                    notes.push(format!("{} environment", asset.environment));
                }

                let group = if asset.owner_team.trim().is_empty() {
                    self.config.default_assignment_group.clone()
                } else {
                    asset.owner_team.clone()
                };
                (priority, group)
            }
            None => {
                let mut priority = self.config.unknown_host_priority;
                if keyword.is_some() {
                    priority = priority.escalate();
                }
                notes.push("host not in asset directory".to_string());
                (priority, self.config.default_assignment_group.clone())
            }
        };

        Verdict::from_rules(
            severity,
            priority,
            group,
            format!("Rule fallback ({reason}): {}", notes.join("; ")),
            reason,
        )
    }
}
