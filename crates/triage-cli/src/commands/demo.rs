//! `triage demo` - sample alerts against mock capabilities.

use anyhow::Result;
use std::sync::Arc;
use triage_core::{
    Alert, BackendConfig, CapabilityConfig, MockBehavior, Outcome, Severity, TicketKind,
    TicketStatus, TriageConfig,
};
use triage_ledger::{Ledger, OutcomeFilter};
use triage_runtime::Orchestrator;

pub(crate) fn demo_config() -> TriageConfig {
    let mut config = TriageConfig::default();

    let mut jira = BackendConfig::new("jira", CapabilityConfig::default());
    jira.project = Some("OPS".to_string());

    let mut servicenow = BackendConfig::new(
        "servicenow",
        CapabilityConfig::mock(MockBehavior::FailTransient { times: 1 }),
    );
    servicenow.kind = TicketKind::Incident;
    servicenow.project = Some("INC".to_string());

    config.dispatch.backends = vec![jira, servicenow];
    config.dispatch.retry.initial_backoff_ms = 50;
    config
}

pub(crate) fn demo_alerts() -> Vec<Alert> {
    vec![
        Alert::new("alert-001", "prod-web-03", Severity::High)
            .with_message("CPU utilization exceeded 95% for 15 minutes"),
        Alert::new("alert-002", "prod-db-01", Severity::Critical)
            .with_message("Database connection pool exhausted"),
        Alert::new("alert-003", "prod-web-01", Severity::Medium)
            .with_message("Disk space usage at 85%"),
        // Resubmission of the first alert.
        Alert::new("alert-001", "prod-web-03", Severity::High)
            .with_message("CPU utilization exceeded 95% for 15 minutes"),
    ]
}

pub async fn run() -> Result<()> {
    let config = demo_config();
    let ledger = Arc::new(Ledger::in_memory());
    let orchestrator = Orchestrator::from_config(&config, ledger.clone())?;

    for alert in demo_alerts() {
        println!("==> {} [{}] {}", alert.alert_id, alert.severity_hint, alert.message);
        let outcome = orchestrator.process_alert(alert).await?;
        print_outcome(&outcome);
    }

    let stats = ledger.stats(&OutcomeFilter::default()).await?;
    println!(
        "\n{} outcomes ({} duplicate), {} tickets created, {} failed",
        stats.total_outcomes, stats.duplicates, stats.tickets_created, stats.tickets_failed
    );
    ledger.close().await?;
    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    if outcome.is_duplicate {
        println!("    duplicate, no tickets created\n");
        return;
    }

    let verdict = &outcome.verdict;
    println!(
        "    verdict: severity {} / priority {} -> {} ({})",
        verdict.severity, verdict.priority, verdict.assignment_group, verdict.source
    );
    if let Some(asset) = &outcome.context.asset_record {
        println!("    asset:   {} / {}", asset.owner_team, asset.environment);
    } else {
        println!("    asset:   unknown host");
    }
    for ticket in &outcome.tickets {
        match ticket.status {
            TicketStatus::Created => println!(
                "    ticket:  {} {} (attempts: {})",
                ticket.backend_name,
                ticket.external_id.as_deref().unwrap_or_default(),
                ticket.attempts
            ),
            TicketStatus::Failed => println!(
                "    ticket:  {} FAILED: {}",
                ticket.backend_name,
                ticket.error_detail.as_deref().unwrap_or_default()
            ),
            TicketStatus::Skipped => println!("    ticket:  {} skipped", ticket.backend_name),
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_config_is_valid() {
        demo_config().validate().unwrap();
    }

    #[tokio::test]
    async fn demo_alerts_produce_tickets_and_one_duplicate() {
        let ledger = Arc::new(Ledger::in_memory());
        let orchestrator = Orchestrator::from_config(&demo_config(), ledger).unwrap();

        let mut outcomes = Vec::new();
        for alert in demo_alerts() {
            outcomes.push(orchestrator.process_alert(alert).await.unwrap());
        }

        assert_eq!(outcomes.iter().filter(|o| o.is_duplicate).count(), 1);
        for outcome in outcomes.iter().filter(|o| !o.is_duplicate) {
            assert_eq!(outcome.count_status(TicketStatus::Created), 2);
        }
        // prod-db-01 is not in the mock inventory.
        assert!(outcomes[1].context.asset_record.is_none());
    }
}
