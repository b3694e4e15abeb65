//! Ledger storage backends.
//!
//! Storage is append-only. The only guarded write is the first outcome for
//! an alert id: it is appended only if no first outcome exists yet, under
//! the same write lock as the check, which gives append-if-absent semantics.
//! Duplicate outcomes are appended freely but must reference a prior one.

use crate::error::LedgerError;
use crate::event::StepEvent;
use crate::filter::OutcomeFilter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use triage_core::config::ledger::{LedgerBackend, LedgerConfig};
use triage_core::Outcome;

/// Trait for ledger storage backends.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Append an outcome. Fails with `AlreadyRecorded` when a non-duplicate
    /// outcome for the same alert id already exists.
    async fn append(&self, outcome: Outcome) -> Result<(), LedgerError>;

    /// The first (non-duplicate) outcome recorded for an alert.
    async fn first_outcome(&self, alert_id: &str) -> Result<Option<Outcome>, LedgerError>;

    /// Query outcomes with filters.
    async fn outcomes(&self, filter: &OutcomeFilter) -> Result<Vec<Outcome>, LedgerError>;

    /// Append a step event.
    async fn record_event(&self, event: StepEvent) -> Result<(), LedgerError>;

    /// Step events for an alert, in append order.
    async fn events(&self, alert_id: &str) -> Result<Vec<StepEvent>, LedgerError>;

    /// Make appended data durable.
    async fn flush(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}

/// Create a storage backend based on configuration.
pub fn create_storage(config: &LedgerConfig) -> Result<Box<dyn LedgerStorage>, LedgerError> {
    match config.backend {
        LedgerBackend::Memory => Ok(Box::new(MemoryStorage::new())),
        LedgerBackend::File => Ok(Box::new(FileStorage::open(&config.directory)?)),
    }
}

/// In-memory index shared by all backends.
#[derive(Default)]
struct Index {
    outcomes: Vec<Outcome>,
    first_by_alert: HashMap<String, usize>,
    events: Vec<StepEvent>,
}

impl Index {
    /// Reject an outcome that would break append-if-absent.
    fn check(&self, outcome: &Outcome) -> Result<(), LedgerError> {
        let recorded = self.first_by_alert.contains_key(outcome.alert_id());
        if outcome.is_duplicate && !recorded {
            return Err(LedgerError::MissingPrior {
                alert_id: outcome.alert_id().to_string(),
            });
        }
        if !outcome.is_duplicate && recorded {
            return Err(LedgerError::AlreadyRecorded {
                alert_id: outcome.alert_id().to_string(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, outcome: Outcome) {
        if !outcome.is_duplicate {
            self.first_by_alert
                .insert(outcome.alert_id().to_string(), self.outcomes.len());
        }
        self.outcomes.push(outcome);
    }

    fn first(&self, alert_id: &str) -> Option<Outcome> {
        self.first_by_alert
            .get(alert_id)
            .and_then(|&idx| self.outcomes.get(idx))
            .cloned()
    }

    fn events_for(&self, alert_id: &str) -> Vec<StepEvent> {
        self.events
            .iter()
            .filter(|e| e.alert_id == alert_id)
            .cloned()
            .collect()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> LedgerError {
    LedgerError::Lock(e.to_string())
}

/// Memory storage. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    index: RwLock<Index>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn append(&self, outcome: Outcome) -> Result<(), LedgerError> {
        let mut index = self.index.write().map_err(poisoned)?;
        index.check(&outcome)?;
        index.insert(outcome);
        Ok(())
    }

    async fn first_outcome(&self, alert_id: &str) -> Result<Option<Outcome>, LedgerError> {
        Ok(self.index.read().map_err(poisoned)?.first(alert_id))
    }

    async fn outcomes(&self, filter: &OutcomeFilter) -> Result<Vec<Outcome>, LedgerError> {
        let index = self.index.read().map_err(poisoned)?;
        Ok(filter.apply(index.outcomes.iter()))
    }

    async fn record_event(&self, event: StepEvent) -> Result<(), LedgerError> {
        self.index.write().map_err(poisoned)?.events.push(event);
        Ok(())
    }

    async fn events(&self, alert_id: &str) -> Result<Vec<StepEvent>, LedgerError> {
        Ok(self.index.read().map_err(poisoned)?.events_for(alert_id))
    }
}

/// File storage with two JSON Lines files:
/// - `outcomes.log` - every outcome, first and duplicate
/// - `events.log` - every step event
///
/// Both files are loaded into memory on open so dedup survives restarts.
pub struct FileStorage {
    directory: PathBuf,
    index: RwLock<Index>,
    outcomes_file: Mutex<File>,
    events_file: Mutex<File>,
}

impl FileStorage {
    /// Open (creating if needed) the ledger files in `directory`.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let directory = directory.as_ref().to_path_buf();
        if !directory.exists() {
            fs::create_dir_all(&directory).map_err(|e| {
                LedgerError::InitializationFailed(format!(
                    "cannot create {}: {}",
                    directory.display(),
                    e
                ))
            })?;
        }

        let outcomes_path = directory.join("outcomes.log");
        let events_path = directory.join("events.log");

        let mut index = Index::default();
        for outcome in load_lines::<Outcome>(&outcomes_path)? {
            if let Err(e) = index.check(&outcome) {
                tracing::warn!(alert_id = %outcome.alert_id(), error = %e, "Skipping inconsistent outcome in ledger file");
                continue;
            }
            index.insert(outcome);
        }
        index.events = load_lines::<StepEvent>(&events_path)?;

        tracing::info!(
            directory = %directory.display(),
            outcomes = index.outcomes.len(),
            events = index.events.len(),
            "Loaded ledger"
        );

        Ok(Self {
            outcomes_file: Mutex::new(open_append(&outcomes_path)?),
            events_file: Mutex::new(open_append(&events_path)?),
            directory,
            index: RwLock::new(index),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Open `path` for appending. A torn last line left by an interrupted write
/// is terminated first so the next record starts on a line of its own.
fn open_append(path: &Path) -> Result<File, LedgerError> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;

    if file.metadata()?.len() > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            tracing::warn!(path = %path.display(), "Ledger file ends with a partial record");
            file.write_all(b"\n")?;
        }
    }
    Ok(file)
}

/// Load records from a JSON Lines file, skipping unparsable lines.
fn load_lines<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, LedgerError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse ledger record on line {} of {}: {}",
                    line_num + 1,
                    path.display(),
                    e
                );
            }
        }
    }

    Ok(records)
}

fn write_line<T: serde::Serialize>(file: &Mutex<File>, record: &T) -> Result<(), LedgerError> {
    let json = serde_json::to_string(record)?;
    let mut file = file.lock().map_err(poisoned)?;
    writeln!(file, "{}", json)?;
    Ok(())
}

#[async_trait]
impl LedgerStorage for FileStorage {
    async fn append(&self, outcome: Outcome) -> Result<(), LedgerError> {
        // Check, write and index under one write lock.
        let mut index = self.index.write().map_err(poisoned)?;
        index.check(&outcome)?;
        write_line(&self.outcomes_file, &outcome)?;
        index.insert(outcome);
        Ok(())
    }

    async fn first_outcome(&self, alert_id: &str) -> Result<Option<Outcome>, LedgerError> {
        Ok(self.index.read().map_err(poisoned)?.first(alert_id))
    }

    async fn outcomes(&self, filter: &OutcomeFilter) -> Result<Vec<Outcome>, LedgerError> {
        let index = self.index.read().map_err(poisoned)?;
        Ok(filter.apply(index.outcomes.iter()))
    }

    async fn record_event(&self, event: StepEvent) -> Result<(), LedgerError> {
        let mut index = self.index.write().map_err(poisoned)?;
        write_line(&self.events_file, &event)?;
        index.events.push(event);
        Ok(())
    }

    async fn events(&self, alert_id: &str) -> Result<Vec<StepEvent>, LedgerError> {
        Ok(self.index.read().map_err(poisoned)?.events_for(alert_id))
    }

    async fn flush(&self) -> Result<(), LedgerError> {
        self.outcomes_file.lock().map_err(poisoned)?.sync_data()?;
        self.events_file.lock().map_err(poisoned)?.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StepKind;
    use triage_core::{Alert, EnrichedContext, FallbackReason, Severity, Verdict};

    fn first(alert_id: &str) -> Outcome {
        Outcome::new(
            Alert::new(alert_id, "h1", Severity::High),
            EnrichedContext::degraded(alert_id),
            Verdict::from_rules(
                Severity::High,
                Severity::High,
                "Operations",
                "",
                FallbackReason::ReasonerDisabled,
            ),
            Vec::new(),
            3,
        )
    }

    #[tokio::test]
    async fn memory_storage_is_append_if_absent() {
        let storage = MemoryStorage::new();
        let prior = first("a-1");
        storage.append(prior.clone()).await.unwrap();

        let err = storage.append(first("a-1")).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyRecorded { .. }));

        let dup = Outcome::duplicate_of(&prior, prior.alert.clone(), 0);
        storage.append(dup).await.unwrap();

        let stored = storage.first_outcome("a-1").await.unwrap().unwrap();
        assert_eq!(stored.outcome_id, prior.outcome_id);

        let all = storage.outcomes(&OutcomeFilter::for_alert("a-1")).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(!all[0].is_duplicate);
        assert!(all[1].is_duplicate);
    }

    #[tokio::test]
    async fn duplicate_without_prior_is_rejected() {
        let storage = MemoryStorage::new();
        let prior = first("a-1");
        let dup = Outcome::duplicate_of(&prior, prior.alert.clone(), 0);

        let err = storage.append(dup).await.unwrap_err();
        assert!(matches!(err, LedgerError::MissingPrior { .. }));
    }

    #[tokio::test]
    async fn events_are_grouped_by_alert() {
        let storage = MemoryStorage::new();
        storage
            .record_event(StepEvent::new(StepKind::AlertReceived, "a-1", "received"))
            .await
            .unwrap();
        storage
            .record_event(StepEvent::new(StepKind::AlertReceived, "a-2", "received"))
            .await
            .unwrap();
        storage
            .record_event(StepEvent::new(StepKind::OutcomeRecorded, "a-1", "recorded"))
            .await
            .unwrap();

        let events = storage.events("a-1").await.unwrap();
        let steps: Vec<_> = events.iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![StepKind::AlertReceived, StepKind::OutcomeRecorded]);
    }
}
