//! Read-only ledger commands: `list`, `show`, `stats`.

use anyhow::Result;
use triage_core::{Outcome, Severity, TicketStatus, TriageConfig};
use triage_ledger::{LedgerStats, OutcomeFilter};

use super::open_ledger;

pub fn list_filter(
    host: Option<String>,
    min_priority: Option<Severity>,
    duplicates: bool,
    limit: usize,
) -> OutcomeFilter {
    OutcomeFilter {
        host,
        min_priority,
        is_duplicate: if duplicates { None } else { Some(false) },
        limit: Some(limit),
        ..Default::default()
    }
}

pub async fn list(config: &TriageConfig, filter: &OutcomeFilter, json: bool) -> Result<()> {
    let ledger = open_ledger(config)?;
    let outcomes = ledger.list_outcomes(filter).await?;

    if json {
        for outcome in &outcomes {
            println!("{}", serde_json::to_string(outcome)?);
        }
        return Ok(());
    }

    if outcomes.is_empty() {
        println!("No outcomes recorded.");
        return Ok(());
    }

    println!(
        "{:<20} {:<16} {:<9} {:<9} {:<14} {:<8} TICKETS",
        "PROCESSED", "ALERT", "SEVERITY", "PRIORITY", "SOURCE", "DUP"
    );
    for outcome in &outcomes {
        println!("{}", summary_row(outcome));
    }
    Ok(())
}

fn summary_row(outcome: &Outcome) -> String {
    let tickets: Vec<String> = outcome
        .tickets
        .iter()
        .map(|t| match t.status {
            TicketStatus::Created => format!(
                "{}:{}",
                t.backend_name,
                t.external_id.as_deref().unwrap_or_default()
            ),
            TicketStatus::Failed => format!("{}:FAILED", t.backend_name),
            TicketStatus::Skipped => format!("{}:skipped", t.backend_name),
        })
        .collect();

    format!(
        "{:<20} {:<16} {:<9} {:<9} {:<14} {:<8} {}",
        outcome.processed_at.format("%Y-%m-%d %H:%M:%S"),
        outcome.alert_id(),
        outcome.verdict.severity.as_str(),
        outcome.verdict.priority.as_str(),
        outcome.verdict.source.to_string(),
        if outcome.is_duplicate { "yes" } else { "no" },
        if tickets.is_empty() { "-".to_string() } else { tickets.join(", ") }
    )
}

pub async fn show(config: &TriageConfig, alert_id: &str) -> Result<()> {
    let ledger = open_ledger(config)?;
    let Some(outcome) = ledger.get_outcome(alert_id).await? else {
        anyhow::bail!("No outcome recorded for alert '{}'", alert_id);
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    let events = ledger.events_for(alert_id).await?;
    if !events.is_empty() {
        println!("\nActivity:");
        for event in events {
            println!("  {}", event.to_log_line());
        }
    }
    Ok(())
}

pub async fn stats(config: &TriageConfig, json: bool) -> Result<()> {
    let ledger = open_ledger(config)?;
    let stats = ledger.stats(&OutcomeFilter::default()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", render_stats(&stats));
    }
    Ok(())
}

fn render_stats(stats: &LedgerStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("Outcomes:          {}\n", stats.total_outcomes));
    out.push_str(&format!("  duplicates:      {}\n", stats.duplicates));
    out.push_str(&format!("  reasoner:        {}\n", stats.reasoner_verdicts));
    out.push_str(&format!("  rule fallback:   {}\n", stats.fallback_verdicts));
    out.push_str(&format!(
        "Tickets:           {} created, {} failed, {} skipped\n",
        stats.tickets_created, stats.tickets_failed, stats.tickets_skipped
    ));
    out.push_str(&format!(
        "Mean processing:   {:.1} ms\n",
        stats.mean_processing_ms
    ));

    if !stats.by_priority.is_empty() {
        out.push_str("By priority:\n");
        for (priority, count) in stats.by_priority.iter().rev() {
            out.push_str(&format!("  {:<9} {}\n", priority.as_str(), count));
        }
    }
    if !stats.patterns.is_empty() {
        out.push_str("Patterns:\n");
        for p in &stats.patterns {
            let name = serde_json::to_value(p.pattern)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            out.push_str(&format!("  {:<20} {}\n", name, p.count));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{Alert, EnrichedContext, TicketRecord, Verdict};

    #[test]
    fn list_filter_hides_duplicates_by_default() {
        let filter = list_filter(None, Some(Severity::High), false, 5);
        assert_eq!(filter.is_duplicate, Some(false));
        assert_eq!(filter.limit, Some(5));

        let all = list_filter(Some("h1".into()), None, true, 5);
        assert_eq!(all.is_duplicate, None);
        assert_eq!(all.host.as_deref(), Some("h1"));
    }

    #[test]
    fn rows_and_stats_render() {
        let outcome = Outcome::new(
            Alert::new("a-1", "h1", Severity::High).with_message("Memory usage at 97%"),
            EnrichedContext::degraded("a-1"),
            Verdict::from_reasoner(Severity::Critical, Severity::Critical, "SRE", "", 0.9),
            vec![
                TicketRecord::created("jira", "OPS-1001", 1),
                TicketRecord::failed("servicenow", "HTTP 403", 1),
            ],
            12,
        );

        let row = summary_row(&outcome);
        assert!(row.contains("a-1"));
        assert!(row.contains("jira:OPS-1001, servicenow:FAILED"));

        let rendered = render_stats(&LedgerStats::from_outcomes(&[outcome]));
        assert!(rendered.contains("1 created, 1 failed, 0 skipped"));
        assert!(rendered.contains("memory_pressure"));
    }
}
