//! Ticket content shared by every ticketing backend.

use serde::Serialize;
use serde_json::json;
use triage_core::{Alert, EnrichedContext, Severity, Verdict};

const SUMMARY_MESSAGE_CHARS: usize = 50;
const DESCRIPTION_LOG_LINES: usize = 5;
const LOG_LINE_CHARS: usize = 100;

/// Backend-neutral ticket content rendered from a verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketDraft {
    /// One-line title, e.g. `Critical Alert: Memory usage at 97% on prod-web-01`.
    pub summary: String,
    /// Markdown body.
    pub description: String,
    pub priority: Severity,
    pub assignment_group: String,
    /// Incident urgency code ("1" highest).
    pub urgency: &'static str,
    /// Incident impact code ("1" highest).
    pub impact: &'static str,
    pub labels: Vec<String>,
}

impl TicketDraft {
    pub fn compose(alert: &Alert, context: &EnrichedContext, verdict: &Verdict) -> Self {
        let message: String = alert.message.chars().take(SUMMARY_MESSAGE_CHARS).collect();
        let summary = format!("{} Alert: {} on {}", verdict.severity, message, alert.host);

        let mut labels = vec![
            "triage".to_string(),
            format!("source-{}", verdict.source),
        ];
        if context.is_degraded() {
            labels.push("degraded-context".to_string());
        }

        Self {
            summary,
            description: describe(alert, context, verdict),
            priority: verdict.priority,
            assignment_group: verdict.assignment_group.clone(),
            urgency: verdict.priority.incident_code(),
            impact: verdict.priority.incident_code(),
            labels,
        }
    }

    /// Request body for issue trackers.
    pub fn issue_body(&self, alert: &Alert, project: Option<&str>) -> serde_json::Value {
        json!({
            "project": project,
            "summary": self.summary,
            "description": self.description,
            "priority": self.priority.as_str(),
            "assignee_group": self.assignment_group,
            "labels": self.labels,
            "alert_id": alert.alert_id,
        })
    }

    /// Request body for incident management systems.
    pub fn incident_body(&self, alert: &Alert) -> serde_json::Value {
        json!({
            "short_description": self.summary,
            "description": self.description,
            "urgency": self.urgency,
            "impact": self.impact,
            "assignment_group": self.assignment_group,
            "cmdb_ci": alert.host,
            "correlation_id": alert.alert_id,
        })
    }
}

fn describe(alert: &Alert, context: &EnrichedContext, verdict: &Verdict) -> String {
    let asset = context.asset_record.as_ref();
    let service = asset
        .and_then(|a| a.service.as_deref())
        .unwrap_or("Unknown");

    let mut out = String::new();
    out.push_str("**Alert Details:**\n");
    out.push_str(&format!("- Alert ID: {}\n", alert.alert_id));
    out.push_str(&format!("- Host: {}\n", alert.host));
    out.push_str(&format!("- Service: {}\n", service));
    out.push_str(&format!("- Reported severity: {}\n", alert.severity_hint));
    out.push_str(&format!("- Timestamp: {}\n", alert.timestamp.to_rfc3339()));

    out.push_str("\n**Message:**\n");
    out.push_str(&alert.message);
    out.push('\n');

    out.push_str("\n**Analysis:**\n");
    out.push_str(&format!(
        "- Severity {} / priority {} ({})\n",
        verdict.severity, verdict.priority, verdict.source
    ));
    if let Some(confidence) = verdict.confidence {
        out.push_str(&format!("- Confidence: {:.2}\n", confidence));
    }
    out.push_str(&format!(
        "- {} error entries found in logs\n",
        context.error_line_count()
    ));
    if let Some(criticality) = asset.and_then(|a| a.criticality) {
        out.push_str(&format!("- Service criticality: {}\n", criticality));
    }
    if !verdict.rationale.is_empty() {
        out.push_str(&format!("- Rationale: {}\n", verdict.rationale));
    }
    if context.is_degraded() {
        let failed: Vec<String> = context
            .enrichment_errors
            .iter()
            .map(ToString::to_string)
            .collect();
        out.push_str(&format!("- Enrichment unavailable: {}\n", failed.join(", ")));
    }

    if !context.recent_logs.is_empty() {
        out.push_str("\n**Recent Log Entries:**\n");
        for line in context.recent_logs.iter().take(DESCRIPTION_LOG_LINES) {
            let ts = line
                .timestamp
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "N/A".to_string());
            let text: String = line.message.chars().take(LOG_LINE_CHARS).collect();
            out.push_str(&format!("- [{}] {}\n", ts, text));
        }
    }

    out.push_str("\n**Recommended Actions:**\n");
    out.push_str("1. Investigate the root cause based on log patterns\n");
    match asset.map(|a| a.dependencies.as_slice()) {
        Some(deps) if !deps.is_empty() => {
            out.push_str(&format!("2. Check service dependencies: {}\n", deps.join(", ")));
        }
        _ => out.push_str("2. Confirm ownership of the host\n"),
    }
    out.push_str("3. Monitor for recurring patterns\n");

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{AssetRecord, Capability, FallbackReason, LogLine};

    fn context() -> EnrichedContext {
        let mut ctx = EnrichedContext::degraded("a-1");
        ctx.enrichment_errors.remove(&Capability::AssetDirectory);
        ctx.asset_record = Some(AssetRecord {
            hostname: "prod-web-01".into(),
            owner_team: "Payment Team".into(),
            environment: "Production".into(),
            service: Some("Payment Gateway".into()),
            criticality: Some(Severity::High),
            dependencies: vec!["prod-db-01".into()],
        });
        ctx.recent_logs = vec![LogLine::new("OutOfMemoryError in worker")];
        ctx
    }

    #[test]
    fn summary_truncates_long_messages() {
        let alert = Alert::new("a-1", "prod-web-01", Severity::High).with_message("x".repeat(80));
        let verdict = Verdict::from_reasoner(Severity::Critical, Severity::High, "SRE", "", 0.9);

        let draft = TicketDraft::compose(&alert, &context(), &verdict);
        assert_eq!(
            draft.summary,
            format!("Critical Alert: {} on prod-web-01", "x".repeat(50))
        );
        assert_eq!(draft.urgency, "2");
        assert_eq!(draft.impact, "2");
    }

    #[test]
    fn description_mentions_context() {
        let alert =
            Alert::new("a-1", "prod-web-01", Severity::High).with_message("Memory usage at 97%");
        let verdict = Verdict::from_rules(
            Severity::High,
            Severity::Critical,
            "Payment Team",
            "production asset",
            FallbackReason::ReasonerTimeout,
        );

        let draft = TicketDraft::compose(&alert, &context(), &verdict);
        assert!(draft.description.contains("- Service: Payment Gateway"));
        assert!(draft.description.contains("1 error entries found in logs"));
        assert!(draft.description.contains("Enrichment unavailable: log_search"));
        assert!(draft.description.contains("Check service dependencies: prod-db-01"));
        assert!(draft.labels.contains(&"source-rule_fallback".to_string()));
        assert!(draft.labels.contains(&"degraded-context".to_string()));

        let body = draft.incident_body(&alert);
        assert_eq!(body["urgency"], "1");
        assert_eq!(body["cmdb_ci"], "prod-web-01");
    }
}
