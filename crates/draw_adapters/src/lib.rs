//! Lotto ingest: source adapters
//!
//! Two upstream shapes:
//!   - tabular: delimited text with a header row, columns found via alias lists
//!   - landmark: markup with no stable DOM, mined by a bounded landmark scanner
//!
//! Both produce `CandidateRow`s for the normalizer. Zero usable rows is an
//! adapter failure, never an empty success.

use draw_core::{CandidateRow, GameProfile};
use std::fmt;

pub mod landmark;
pub mod tabular;

pub use landmark::{LandmarkAdapter, LandmarkGrammar, LandmarkScanner, ScanReport, SecondaryKind, SecondaryLandmark};
pub use tabular::{scan_number_tokens, TabularAdapter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// None of a required field's header aliases is present.
    SchemaMismatch { field: &'static str, headers: Vec<String> },
    /// Markup produced zero complete landmark matches.
    ExtractionFailure { partial: usize },
    /// Header resolved, but every data row was skipped.
    NoUsableRows { skipped: usize },
    /// Input could not be read as delimited text at all.
    Malformed(String),
    /// Grammar does not fit the game profile.
    Grammar(String),
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaMismatch { field, headers } => {
                write!(f, "schema mismatch: no alias for '{field}' in header {headers:?}")
            }
            Self::ExtractionFailure { partial } => {
                write!(f, "extraction failure: 0 landmark matches ({partial} partial)")
            }
            Self::NoUsableRows { skipped } => write!(f, "no usable rows ({skipped} skipped)"),
            Self::Malformed(msg) => write!(f, "malformed input: {msg}"),
            Self::Grammar(msg) => write!(f, "grammar error: {msg}"),
        }
    }
}

impl std::error::Error for AdapterError {}

/// Adapter output: candidate rows plus how many rows/matches were discarded.
#[derive(Debug, Default)]
pub struct Adapted {
    pub rows: Vec<CandidateRow>,
    pub discarded: usize,
}

pub trait SourceAdapter {
    fn adapt(&self, raw: &str, profile: &GameProfile) -> Result<Adapted, AdapterError>;
}
