//! Lotto ingest: dedup merge + persistence port
//!
//! The orchestrator is the only caller. Adapters never touch the filesystem,
//! so the "prior store untouched on failure" rule lives in one place.

pub mod csv_store;
pub mod merge;

pub use csv_store::{CsvDrawStore, CANONICAL_HEADER};
pub use merge::{merge, merge_into};

use draw_core::DrawRecord;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum StoreError {
    Io(String),
    Csv(String),
    /// Persisted store exists but cannot be read back as canonical rows.
    Corrupt { path: PathBuf, line: u64, reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
            Self::Corrupt { path, line, reason } => {
                write!(f, "{}:{line}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<csv::Error> for StoreError {
    fn from(e: csv::Error) -> Self {
        StoreError::Csv(e.to_string())
    }
}

/// Persistence port. Read once to seed the merge, replace once per run.
pub trait DrawStore {
    /// Prior history for `game`; empty when nothing has been stored yet.
    fn load(&self, game: &str) -> Result<Vec<DrawRecord>, StoreError>;

    /// Atomically replaces the whole store for `game`.
    fn replace(&self, game: &str, rows: &[DrawRecord]) -> Result<PathBuf, StoreError>;

    /// Saves a raw upstream response verbatim, away from the canonical store.
    fn dump_diagnostic(&self, game: &str, source: &str, raw: &str) -> Result<PathBuf, StoreError>;
}
