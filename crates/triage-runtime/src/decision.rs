//! Decision stage: one reasoner call, validated, with rule fallback.
//!
//! The reasoner is asked exactly once per alert. Any failure (transport,
//! timeout, rate limiting, unparseable or schema-violating output) moves the
//! alert irrevocably to the rule table.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use triage_core::{
    Alert, EnrichedContext, FallbackConfig, FallbackReason, ReasonerConfig, Severity, Verdict,
};

use crate::capability::{AnalysisRequest, Capabilities, Reasoner, ReasonerError};
use crate::error::PipelineError;
use crate::fallback::RuleTable;

const VERDICT_SCHEMA: &str = include_str!("../schemas/verdict.schema.json");

/// Schema errors reported per rejected verdict.
const MAX_SCHEMA_ERRORS: usize = 5;

/// A verdict tagged with how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Reasoned(Verdict),
    Fallback {
        verdict: Verdict,
        reason: FallbackReason,
        /// What went wrong with the reasoner.
        detail: String,
    },
}

impl Decision {
    pub fn verdict(&self) -> &Verdict {
        match self {
            Self::Reasoned(verdict) | Self::Fallback { verdict, .. } => verdict,
        }
    }

    pub fn into_verdict(self) -> Verdict {
        match self {
            Self::Reasoned(verdict) | Self::Fallback { verdict, .. } => verdict,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    severity: Severity,
    priority: Severity,
    assignment_group: String,
    #[serde(default)]
    rationale: String,
    confidence: f64,
}

pub struct DecisionEngine {
    reasoner: Option<Arc<dyn Reasoner>>,
    rules: RuleTable,
    validator: jsonschema::Validator,
    timeout: Duration,
    prompt_log_lines: usize,
}

impl DecisionEngine {
    pub fn new(
        capabilities: &Capabilities,
        reasoner: &ReasonerConfig,
        fallback: &FallbackConfig,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            reasoner: capabilities.reasoner.clone(),
            rules: RuleTable::new(fallback.clone()),
            validator: verdict_validator()?,
            timeout: reasoner.timeout(),
            prompt_log_lines: reasoner.prompt_log_lines,
        })
    }

    pub async fn decide(&self, alert: &Alert, context: &EnrichedContext) -> Decision {
        let Some(reasoner) = &self.reasoner else {
            return self.fall_back(alert, context, FallbackReason::ReasonerDisabled, "reasoner disabled");
        };

        let prompt = self.build_prompt(alert, context);
        let request = AnalysisRequest {
            alert,
            context,
            prompt: &prompt,
        };

        let raw = match tokio::time::timeout(self.timeout, reasoner.analyze(request)).await {
            Err(_) => {
                let detail = format!("no answer within {}s", self.timeout.as_secs_f64());
                return self.fall_back(alert, context, FallbackReason::ReasonerTimeout, &detail);
            }
            Ok(Err(e)) => {
                let reason = match &e {
                    ReasonerError::Unavailable(_) => FallbackReason::ReasonerUnavailable,
                    ReasonerError::InvalidResponse(_) => FallbackReason::InvalidResponse,
                    ReasonerError::RateLimited => FallbackReason::RateLimited,
                };
                return self.fall_back(alert, context, reason, &e.to_string());
            }
            Ok(Ok(raw)) => raw,
        };

        match self.parse(raw) {
            Ok(verdict) => {
                tracing::debug!(
                    alert_id = %alert.alert_id,
                    severity = %verdict.severity,
                    priority = %verdict.priority,
                    "Reasoner verdict accepted"
                );
                Decision::Reasoned(verdict)
            }
            Err(detail) => self.fall_back(alert, context, FallbackReason::SchemaViolation, &detail),
        }
    }

    /// Validate a raw reasoner document and convert it to a verdict.
    fn parse(&self, mut raw: serde_json::Value) -> Result<Verdict, String> {
        normalize_levels(&mut raw);

        if !self.validator.is_valid(&raw) {
            let errors: Vec<String> = self
                .validator
                .iter_errors(&raw)
                .take(MAX_SCHEMA_ERRORS)
                .map(|e| {
                    let path = e.instance_path().to_string();
                    let location = if path.is_empty() { "(root)".to_string() } else { path };
                    format!("{location}: {e}")
                })
                .collect();
            return Err(errors.join("; "));
        }

        let parsed: RawVerdict = serde_json::from_value(raw).map_err(|e| e.to_string())?;
        let rationale = if parsed.rationale.trim().is_empty() {
            "No rationale provided".to_string()
        } else {
            parsed.rationale
        };
        Ok(Verdict::from_reasoner(
            parsed.severity,
            parsed.priority,
            parsed.assignment_group.trim(),
            rationale,
            parsed.confidence,
        ))
    }

    fn fall_back(
        &self,
        alert: &Alert,
        context: &EnrichedContext,
        reason: FallbackReason,
        detail: &str,
    ) -> Decision {
        if reason != FallbackReason::ReasonerDisabled {
            tracing::warn!(
                alert_id = %alert.alert_id,
                reason = %reason,
                detail = %detail,
                "Reasoner failed, applying rule fallback"
            );
        }
        Decision::Fallback {
            verdict: self.rules.evaluate(alert, context, reason),
            reason,
            detail: detail.to_string(),
        }
    }

    /// Prompt sent to text-completion reasoners.
    pub fn build_prompt(&self, alert: &Alert, context: &EnrichedContext) -> String {
        let logs: Vec<String> = context
            .recent_logs
            .iter()
            .take(self.prompt_log_lines)
            .map(|l| {
                format!(
                    "  [{}] {} {}",
                    l.timestamp.map(|t| t.to_rfc3339()).unwrap_or_else(|| "N/A".into()),
                    l.level.as_deref().unwrap_or("-"),
                    l.message
                )
            })
            .collect();

        let asset = match &context.asset_record {
            Some(a) => format!(
                "- Owner Team: {}\n- Environment: {}\n- Service: {}\n- Criticality: {}\n- Dependencies: {}",
                a.owner_team,
                a.environment,
                a.service.as_deref().unwrap_or("Unknown"),
                a.criticality.map(|c| c.as_str()).unwrap_or("Unknown"),
                a.dependencies.join(", ")
            ),
            None => "- Unknown (host not found or directory unavailable)".to_string(),
        };

        format!(
            "You are an expert SRE triaging an incident alert. Respond with JSON only.\n\n\
             Alert:\n- ID: {id}\n- Reported severity: {sev}\n- Host: {host}\n- Message: {msg}\n- Timestamp: {ts}\n\n\
             Recent logs ({count} of {total}, {errors} errors):\n{logs}\n\n\
             Asset:\n{asset}\n\n\
             Respond with an object of the form:\n\
             {{\"severity\": \"Critical|High|Medium|Low\", \"priority\": \"Critical|High|Medium|Low\", \
             \"assignment_group\": \"team name\", \"rationale\": \"short root-cause summary\", \
             \"confidence\": 0.0}}",
            id = alert.alert_id,
            sev = alert.severity_hint,
            host = alert.host,
            msg = alert.message,
            ts = alert.timestamp.to_rfc3339(),
            count = logs.len(),
            total = context.recent_logs.len(),
            errors = context.error_line_count(),
            logs = if logs.is_empty() { "  (none)".to_string() } else { logs.join("\n") },
            asset = asset,
        )
    }
}

fn verdict_validator() -> Result<jsonschema::Validator, PipelineError> {
    let schema: serde_json::Value = serde_json::from_str(VERDICT_SCHEMA)
        .map_err(|e| PipelineError::Setup(format!("verdict schema is not JSON: {e}")))?;
    jsonschema::draft202012::options()
        .build(&schema)
        .map_err(|e| PipelineError::Setup(format!("verdict schema does not compile: {e}")))
}

/// Canonicalize `severity`/`priority` spelling ("high" -> "High").
fn normalize_levels(raw: &mut serde_json::Value) {
    let Some(obj) = raw.as_object_mut() else {
        return;
    };
    for field in ["severity", "priority"] {
        if let Some(serde_json::Value::String(level)) = obj.get_mut(field) {
            if let Ok(parsed) = level.parse::<Severity>() {
                *level = parsed.as_str().to_string();
            }
        }
    }
}
