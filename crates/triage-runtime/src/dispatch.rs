//! Dispatch stage: concurrent ticket creation with bounded retry.

use futures::future::join_all;
use std::time::Instant;
use triage_core::{Alert, EnrichedContext, RetryConfig, TicketRecord, Verdict};

use crate::capability::{ConfiguredSink, TicketError};
use crate::enrichment::elapsed_ms;

/// Fans one verdict out to every configured ticketing backend.
///
/// Returns one record per configured backend, in configuration order, once
/// every backend has reached a terminal state. Backends are independent: a
/// failure in one never affects another.
pub struct DispatchCoordinator {
    sinks: Vec<ConfiguredSink>,
    retry: RetryConfig,
}

impl DispatchCoordinator {
    pub fn new(sinks: Vec<ConfiguredSink>, retry: RetryConfig) -> Self {
        Self { sinks, retry }
    }

    pub fn backend_count(&self) -> usize {
        self.sinks.len()
    }

    pub async fn dispatch(
        &self,
        alert: &Alert,
        context: &EnrichedContext,
        verdict: &Verdict,
    ) -> Vec<TicketRecord> {
        join_all(
            self.sinks
                .iter()
                .map(|sink| self.dispatch_one(sink, alert, context, verdict)),
        )
        .await
    }

    async fn dispatch_one(
        &self,
        slot: &ConfiguredSink,
        alert: &Alert,
        context: &EnrichedContext,
        verdict: &Verdict,
    ) -> TicketRecord {
        let backend = slot.name();
        if !slot.enabled {
            tracing::debug!(backend = %backend, alert_id = %alert.alert_id, "Backend disabled, skipping");
            return TicketRecord::skipped(backend);
        }

        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = tokio::time::timeout(
                slot.timeout,
                slot.sink.create_ticket(alert, context, verdict),
            )
            .await
            .unwrap_or_else(|_| {
                Err(TicketError::Transient(format!(
                    "timed out after {}s",
                    slot.timeout.as_secs_f64()
                )))
            });

            match result {
                Ok(external_id) => {
                    tracing::info!(
                        backend = %backend,
                        alert_id = %alert.alert_id,
                        ticket = %external_id,
                        attempts = attempt,
                        duration_ms = elapsed_ms(started),
                        "Ticket created"
                    );
                    return TicketRecord::created(backend, external_id, attempt);
                }
                Err(e) if e.is_retryable() && attempt <= self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        backend = %backend,
                        alert_id = %alert.alert_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Ticket creation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        backend = %backend,
                        alert_id = %alert.alert_id,
                        attempts = attempt,
                        error = %e,
                        "Ticket creation failed"
                    );
                    return TicketRecord::failed(backend, e.to_string(), attempt);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::mock::MockTicketSink;
    use crate::capability::TicketSink;
    use std::sync::Arc;
    use std::time::Duration;
    use triage_core::{MockBehavior, Severity, TicketStatus};

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            multiplier: 2.0,
            max_backoff_ms: 5,
        }
    }

    fn slot(sink: &Arc<MockTicketSink>) -> ConfiguredSink {
        ConfiguredSink::new(sink.clone() as Arc<dyn TicketSink>, Duration::from_secs(1))
    }

    fn inputs() -> (Alert, EnrichedContext, Verdict) {
        (
            Alert::new("a-1", "h1", Severity::High),
            EnrichedContext::degraded("a-1"),
            Verdict::from_reasoner(Severity::High, Severity::High, "SRE", "", 0.9),
        )
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let sink = Arc::new(MockTicketSink::new("jira", MockBehavior::FailTransient { times: 2 }));
        let coordinator = DispatchCoordinator::new(vec![slot(&sink)], fast_retry(3));
        let (alert, ctx, verdict) = inputs();

        let records = coordinator.dispatch(&alert, &ctx, &verdict).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TicketStatus::Created);
        assert_eq!(records[0].attempts, 3);
        assert_eq!(sink.calls(), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let sink = Arc::new(MockTicketSink::new("jira", MockBehavior::Unavailable));
        let coordinator = DispatchCoordinator::new(vec![slot(&sink)], fast_retry(2));
        let (alert, ctx, verdict) = inputs();

        let records = coordinator.dispatch(&alert, &ctx, &verdict).await;
        assert_eq!(records[0].status, TicketStatus::Failed);
        assert_eq!(records[0].attempts, 3);
        assert_eq!(sink.calls(), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let failing = Arc::new(MockTicketSink::new(
            "servicenow",
            MockBehavior::FailPermanent {
                message: "HTTP 400: invalid assignment group".into(),
            },
        ));
        let healthy = Arc::new(MockTicketSink::new("jira", MockBehavior::Succeed));
        let coordinator =
            DispatchCoordinator::new(vec![slot(&healthy), slot(&failing)], fast_retry(3));
        let (alert, ctx, verdict) = inputs();

        let records = coordinator.dispatch(&alert, &ctx, &verdict).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].backend_name, "jira");
        assert_eq!(records[0].status, TicketStatus::Created);
        assert_eq!(records[1].status, TicketStatus::Failed);
        assert!(records[1]
            .error_detail
            .as_deref()
            .unwrap()
            .contains("invalid assignment group"));
        assert_eq!(failing.calls(), 1);
    }

    #[tokio::test]
    async fn slow_backend_times_out_per_attempt() {
        let sink = Arc::new(MockTicketSink::new("jira", MockBehavior::Delay { ms: 300 }));
        let slot = ConfiguredSink::new(sink.clone() as Arc<dyn TicketSink>, Duration::from_millis(20));
        let coordinator = DispatchCoordinator::new(vec![slot], fast_retry(1));
        let (alert, ctx, verdict) = inputs();

        let records = coordinator.dispatch(&alert, &ctx, &verdict).await;
        assert_eq!(records[0].status, TicketStatus::Failed);
        assert_eq!(records[0].attempts, 2);
        assert!(records[0].error_detail.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn disabled_backends_are_skipped() {
        let sink = Arc::new(MockTicketSink::new("jira", MockBehavior::Succeed));
        let coordinator = DispatchCoordinator::new(vec![slot(&sink).disabled()], fast_retry(3));
        let (alert, ctx, verdict) = inputs();

        let records = coordinator.dispatch(&alert, &ctx, &verdict).await;
        assert_eq!(records[0].status, TicketStatus::Skipped);
        assert_eq!(sink.calls(), 0);
    }

    #[tokio::test]
    async fn no_backends_yields_no_records() {
        let coordinator = DispatchCoordinator::new(Vec::new(), RetryConfig::default());
        let (alert, ctx, verdict) = inputs();
        assert!(coordinator.dispatch(&alert, &ctx, &verdict).await.is_empty());
    }
}
