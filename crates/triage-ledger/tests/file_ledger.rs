//! Integration tests for the file-backed ledger.
//!
//! Run with: cargo test --package triage-ledger --test file_ledger

use triage_core::{
    Alert, EnrichedContext, LedgerBackend, LedgerConfig, Outcome, Severity, TicketRecord, Verdict,
};
use triage_ledger::{FileStorage, Ledger, LedgerError, LedgerStorage, OutcomeFilter, StepEvent, StepKind};

fn config(dir: &std::path::Path) -> LedgerConfig {
    LedgerConfig {
        backend: LedgerBackend::File,
        directory: dir.to_path_buf(),
        stdout: false,
    }
}

fn outcome(alert_id: &str) -> Outcome {
    Outcome::new(
        Alert::new(alert_id, "prod-web-01", Severity::High).with_message("Memory usage at 97%"),
        EnrichedContext::degraded(alert_id),
        Verdict::from_reasoner(Severity::High, Severity::Critical, "Payment Team", "leak", 0.8),
        vec![TicketRecord::created("jira", "OPS-1001", 1)],
        25,
    )
}

/// Outcomes survive a restart and still block re-recording the same alert.
#[tokio::test]
async fn dedup_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let first = outcome("a-1");
    {
        let ledger = Ledger::open(config(dir.path())).unwrap();
        ledger.append(first.clone()).await.unwrap();
        ledger
            .record(StepEvent::new(StepKind::OutcomeRecorded, "a-1", "recorded"))
            .await;
        ledger.close().await.unwrap();
    }

    let ledger = Ledger::open(config(dir.path())).unwrap();
    let prior = ledger.check_duplicate("a-1").await.unwrap().unwrap();
    assert_eq!(prior.outcome_id, first.outcome_id);
    assert_eq!(prior.tickets, first.tickets);

    let err = ledger.append(outcome("a-1")).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyRecorded { .. }));

    let events = ledger.events_for("a-1").await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].step, StepKind::OutcomeRecorded);
}

/// The outcome log is append-only: duplicates add lines, never rewrite.
#[tokio::test]
async fn duplicates_are_appended() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::open(dir.path()).unwrap();

    let first = outcome("a-1");
    storage.append(first.clone()).await.unwrap();
    storage
        .append(Outcome::duplicate_of(&first, first.alert.clone(), 0))
        .await
        .unwrap();
    storage.flush().await.unwrap();

    let content = std::fs::read_to_string(dir.path().join("outcomes.log")).unwrap();
    assert_eq!(content.lines().count(), 2);

    let all = storage
        .outcomes(&OutcomeFilter::for_alert("a-1"))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].duplicate_of, Some(first.outcome_id));
}

/// Corrupt lines are skipped rather than failing the whole load.
#[tokio::test]
async fn skips_corrupt_lines() {
    let dir = tempfile::tempdir().unwrap();
    let good = serde_json::to_string(&outcome("a-1")).unwrap();
    std::fs::write(
        dir.path().join("outcomes.log"),
        format!("{good}\n{{not json\n\n"),
    )
    .unwrap();

    let ledger = Ledger::open(config(dir.path())).unwrap();
    let all = ledger.list_outcomes(&OutcomeFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].alert_id(), "a-1");
}

/// A record cut short by a crash does not swallow the next append.
#[tokio::test]
async fn torn_tail_does_not_swallow_next_outcome() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("outcomes.log"), "{\"outcome_id\": \"trunc").unwrap();

    let first = outcome("a-1");
    {
        let storage = FileStorage::open(dir.path()).unwrap();
        storage.append(first.clone()).await.unwrap();
        storage.flush().await.unwrap();
    }

    let storage = FileStorage::open(dir.path()).unwrap();
    let prior = storage.first_outcome("a-1").await.unwrap().unwrap();
    assert_eq!(prior.outcome_id, first.outcome_id);

    let content = std::fs::read_to_string(dir.path().join("outcomes.log")).unwrap();
    assert!(content.ends_with('\n'));
    assert_eq!(content.lines().count(), 2);
}
