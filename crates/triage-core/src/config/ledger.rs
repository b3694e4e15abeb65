//! Ledger storage configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the dedup & audit ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Storage backend.
    #[serde(default)]
    pub backend: LedgerBackend,

    /// Directory holding `outcomes.log` and `events.log` (file backend).
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Also print step events to stdout as human-readable lines.
    #[serde(default)]
    pub stdout: bool,
}

/// Ledger storage backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// Process memory only; lost on shutdown.
    #[default]
    Memory,
    /// JSON Lines files, reloaded on start.
    File,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            directory: default_directory(),
            stdout: false,
        }
    }
}

fn default_directory() -> PathBuf {
    PathBuf::from("ledger")
}
