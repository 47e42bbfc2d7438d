//! Lotto ingest
//!
//! Fetches NJ lottery draw history from public sources, normalizes every row
//! to one canonical shape and merges it into a per-game CSV store without ever
//! clobbering good history with a bad fetch.

pub mod config;
pub mod orchestrator;

pub use config::{Catalog, GameConfig, Settings, SourceConfig, SourceKind};
pub use orchestrator::{Orchestrator, RunReport, SourceReport, SourceState};
