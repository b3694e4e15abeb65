//! End-to-end alert processing.

use std::sync::Arc;
use std::time::Instant;
use triage_core::{Alert, Outcome, TicketStatus, TriageConfig};
use triage_ledger::{Ledger, OutcomeFilter, StepEvent, StepKind};
use uuid::Uuid;

use crate::capability::Capabilities;
use crate::decision::{Decision, DecisionEngine};
use crate::dispatch::DispatchCoordinator;
use crate::enrichment::{elapsed_ms, Enricher, Enrichment};
use crate::error::PipelineError;

/// Runs alerts through enrich, decide, dispatch and record.
///
/// Alerts are independent and may be processed concurrently from many tasks;
/// submissions of the same `alert_id` are serialized through the ledger's
/// per-key lock so only one of them ever dispatches tickets.
pub struct Orchestrator {
    enricher: Enricher,
    decision: DecisionEngine,
    dispatcher: DispatchCoordinator,
    ledger: Arc<Ledger>,
}

impl Orchestrator {
    pub fn new(
        enricher: Enricher,
        decision: DecisionEngine,
        dispatcher: DispatchCoordinator,
        ledger: Arc<Ledger>,
    ) -> Self {
        Self {
            enricher,
            decision,
            dispatcher,
            ledger,
        }
    }

    /// Build every stage from configuration.
    pub fn from_config(config: &TriageConfig, ledger: Arc<Ledger>) -> Result<Self, PipelineError> {
        let capabilities = Capabilities::from_config(config)?;
        Self::with_capabilities(config, capabilities, ledger)
    }

    /// Build the stages around an explicit capability set.
    pub fn with_capabilities(
        config: &TriageConfig,
        capabilities: Capabilities,
        ledger: Arc<Ledger>,
    ) -> Result<Self, PipelineError> {
        let enricher = Enricher::new(&capabilities, &config.enrichment);
        let decision = DecisionEngine::new(&capabilities, &config.reasoner, &config.fallback)?;
        let dispatcher = DispatchCoordinator::new(capabilities.sinks, config.dispatch.retry.clone());
        Ok(Self::new(enricher, decision, dispatcher, ledger))
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Process one alert to a terminal outcome.
    ///
    /// Only malformed alerts and ledger failures are errors; degraded
    /// enrichment, reasoner failure and backend failure all yield an outcome.
    #[tracing::instrument(skip_all, fields(alert_id = %alert.alert_id, host = %alert.host))]
    pub async fn process_alert(&self, alert: Alert) -> Result<Outcome, PipelineError> {
        alert.validate()?;

        let started = Instant::now();
        let run = Run {
            ledger: self.ledger.as_ref(),
            alert_id: alert.alert_id.clone(),
            correlation_id: Uuid::new_v4(),
        };

        let _guard = self.ledger.lock(&alert.alert_id).await;

        run.record(
            StepEvent::builder(
                StepKind::AlertReceived,
                &run.alert_id,
                format!(
                    "{} alert on {}: {}",
                    alert.severity_hint, alert.host, alert.message
                ),
            ),
        )
        .await;

        if let Some(prior) = self.ledger.check_duplicate(&alert.alert_id).await? {
            tracing::info!(prior_outcome = %prior.outcome_id, "Duplicate alert, no tickets dispatched");
            run.record(StepEvent::builder(
                StepKind::DuplicateDetected,
                &run.alert_id,
                format!("Already processed as outcome {}", prior.outcome_id),
            ))
            .await;

            let outcome = Outcome::duplicate_of(&prior, alert, elapsed_ms(started));
            self.ledger.append(outcome.clone()).await?;
            run.record(StepEvent::builder(
                StepKind::OutcomeRecorded,
                &run.alert_id,
                format!("Duplicate outcome {} recorded", outcome.outcome_id),
            ))
            .await;
            return Ok(outcome);
        }

        let enrichment = self.enricher.enrich(&alert).await;
        run.record_enrichment(&enrichment).await;
        let context = enrichment.context;

        let decision_started = Instant::now();
        let decision = self.decision.decide(&alert, &context).await;
        run.record_decision(&decision, elapsed_ms(decision_started)).await;
        let verdict = decision.into_verdict();

        let tickets = self.dispatcher.dispatch(&alert, &context, &verdict).await;
        for ticket in &tickets {
            let (step, detail) = match ticket.status {
                TicketStatus::Created => (
                    StepKind::TicketCreated,
                    format!(
                        "Created {}",
                        ticket.external_id.as_deref().unwrap_or_default()
                    ),
                ),
                TicketStatus::Failed => (StepKind::TicketFailed, "Ticket creation failed".to_string()),
                TicketStatus::Skipped => (StepKind::TicketSkipped, "Backend disabled".to_string()),
            };
            let mut event = StepEvent::builder(step, &run.alert_id, detail)
                .backend(&ticket.backend_name)
                .attempt(ticket.attempts);
            if let Some(error) = &ticket.error_detail {
                event = event.error(error);
            }
            run.record(event).await;
        }

        let outcome = Outcome::new(alert, context, verdict, tickets, elapsed_ms(started));
        self.ledger.append(outcome.clone()).await?;

        tracing::info!(
            outcome_id = %outcome.outcome_id,
            severity = %outcome.verdict.severity,
            priority = %outcome.verdict.priority,
            source = %outcome.verdict.source,
            created = outcome.count_status(TicketStatus::Created),
            failed = outcome.count_status(TicketStatus::Failed),
            processing_ms = outcome.processing_ms,
            "Alert processed"
        );
        run.record(
            StepEvent::builder(
                StepKind::OutcomeRecorded,
                &run.alert_id,
                format!(
                    "Outcome {} recorded with {} ticket(s)",
                    outcome.outcome_id,
                    outcome.count_status(TicketStatus::Created)
                ),
            )
            .duration_ms(outcome.processing_ms),
        )
        .await;

        Ok(outcome)
    }

    /// Recorded outcomes matching `filter`.
    pub async fn list_outcomes(&self, filter: &OutcomeFilter) -> Result<Vec<Outcome>, PipelineError> {
        Ok(self.ledger.list_outcomes(filter).await?)
    }

    /// The first outcome for `alert_id`, if the alert has been processed.
    pub async fn get_outcome(&self, alert_id: &str) -> Result<Option<Outcome>, PipelineError> {
        Ok(self.ledger.get_outcome(alert_id).await?)
    }
}

/// Step recording for one pipeline run.
struct Run<'a> {
    ledger: &'a Ledger,
    alert_id: String,
    correlation_id: Uuid,
}

impl Run<'_> {
    async fn record(&self, event: triage_ledger::StepEventBuilder) {
        self.ledger
            .record(event.correlation_id(self.correlation_id).build())
            .await;
    }

    async fn record_enrichment(&self, enrichment: &Enrichment) {
        let context = &enrichment.context;

        let logs = match &enrichment.logs.error {
            None => StepEvent::builder(
                StepKind::LogsRetrieved,
                &self.alert_id,
                format!(
                    "Found {} log lines ({} errors)",
                    context.recent_logs.len(),
                    context.error_line_count()
                ),
            ),
            Some(error) => {
                StepEvent::builder(StepKind::LogsFailed, &self.alert_id, "Log search failed")
                    .error(error)
            }
        };
        self.record(logs.duration_ms(enrichment.logs.elapsed_ms)).await;

        let asset = match (&enrichment.asset.error, &context.asset_record) {
            (Some(error), _) => StepEvent::builder(
                StepKind::AssetFailed,
                &self.alert_id,
                "Asset lookup failed",
            )
            .error(error),
            (None, Some(record)) => StepEvent::builder(
                StepKind::AssetResolved,
                &self.alert_id,
                format!(
                    "Owner {} ({} environment)",
                    record.owner_team, record.environment
                ),
            ),
            (None, None) => StepEvent::builder(
                StepKind::AssetUnknown,
                &self.alert_id,
                "Host not in asset directory",
            ),
        };
        self.record(asset.duration_ms(enrichment.asset.elapsed_ms)).await;
    }

    async fn record_decision(&self, decision: &Decision, duration_ms: u64) {
        let verdict = decision.verdict();
        let summary = format!(
            "Severity {}, priority {}, group {}",
            verdict.severity, verdict.priority, verdict.assignment_group
        );
        let event = match decision {
            Decision::Reasoned(_) => {
                StepEvent::builder(StepKind::VerdictReasoned, &self.alert_id, summary).meta(
                    serde_json::json!({ "confidence": verdict.confidence }),
                )
            }
            Decision::Fallback { reason, detail, .. } => {
                StepEvent::builder(StepKind::VerdictFallback, &self.alert_id, summary)
                    .error(detail)
                    .meta(serde_json::json!({ "fallback_reason": reason }))
            }
        };
        self.record(event.duration_ms(duration_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::mock::MockTicketSink;
    use crate::capability::ConfiguredSink;
    use std::time::Duration;
    use triage_core::{MockBehavior, Severity};

    fn orchestrator() -> Orchestrator {
        let capabilities = Capabilities::mocks().with_sink(ConfiguredSink::new(
            Arc::new(MockTicketSink::new("jira", MockBehavior::Succeed)),
            Duration::from_secs(1),
        ));
        Orchestrator::with_capabilities(
            &TriageConfig::default(),
            capabilities,
            Arc::new(Ledger::in_memory()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn records_activity_trail() {
        let orchestrator = orchestrator();
        let alert = Alert::new("a-1", "prod-web-01", Severity::High).with_message("Memory usage at 97%");

        let outcome = orchestrator.process_alert(alert).await.unwrap();
        assert_eq!(outcome.tickets.len(), 1);

        let events = orchestrator.ledger().events_for("a-1").await.unwrap();
        let steps: Vec<StepKind> = events.iter().map(|e| e.step).collect();
        assert_eq!(
            steps,
            vec![
                StepKind::AlertReceived,
                StepKind::LogsRetrieved,
                StepKind::AssetResolved,
                StepKind::VerdictReasoned,
                StepKind::TicketCreated,
                StepKind::OutcomeRecorded,
            ]
        );
        let correlation = events[0].correlation_id;
        assert!(correlation.is_some());
        assert!(events.iter().all(|e| e.correlation_id == correlation));
    }

    #[tokio::test]
    async fn malformed_alert_is_rejected_without_trace() {
        let orchestrator = orchestrator();
        let err = orchestrator
            .process_alert(Alert::new("a-1", "", Severity::High))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedAlert(_)));

        assert!(orchestrator.get_outcome("a-1").await.unwrap().is_none());
        assert!(orchestrator.ledger().events_for("a-1").await.unwrap().is_empty());
    }
}
