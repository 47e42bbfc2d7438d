/// Lotto ingest: one batch run
///
/// What it does:
///   1. Loads the game catalog (config/games.toml, or the built-in NJ games)
///   2. For each game: fetch every source, adapt, normalize, merge new draws
///   3. Replaces <data_dir>/<game>.csv only when something new arrived
///   4. Writes SOURCE_STATUS / RUN_SUMMARY events to <log_dir>/<date>.jsonl
///
/// Exit code is 1 only when a required source failed.
///
/// Run:
///   cargo run --bin ingest -- [game ...]

use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use draw_store::CsvDrawStore;
use logger::EventLogger;
use lotto_ingest::{Catalog, Orchestrator, Settings, SourceState};
use std::env;
use std::fs::File;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let settings = Settings::parse();

    info!("=== Lotto ingest ===");
    info!("Data: {}  Logs: {}", settings.data_dir.display(), settings.log_dir.display());

    // Single instance lock
    let lock_file_path = env::temp_dir().join("lotto_ingest.lock");
    let lock_file = match File::create(&lock_file_path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to create lock file at {:?}: {}", lock_file_path, e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut lock = fd_lock::RwLock::new(lock_file);
    let _write_guard = match lock.try_write() {
        Ok(guard) => guard,
        Err(_) => {
            warn!("Another ingest run is in progress. Exiting.");
            return Ok(ExitCode::FAILURE);
        }
    };

    let catalog = Catalog::load(&settings.games)?.only(&settings.only)?;
    info!(
        "Games: {}",
        catalog.games.iter().map(|g| g.profile.game.as_str()).collect::<Vec<_>>().join(", ")
    );

    let orchestrator = Orchestrator::new(CsvDrawStore::new(&settings.data_dir), settings.timeout())
        .with_events(EventLogger::new(&settings.log_dir));
    let report = orchestrator.run(&catalog).await;

    for s in &report.sources {
        let detail = match &s.state {
            SourceState::Written { rows_added, rows_rejected } => {
                format!("+{rows_added} rows, {rows_rejected} rejected")
            }
            SourceState::FallbackKept { reason, .. } | SourceState::Failed { reason } => reason.clone(),
        };
        println!("{:<14} {:<14} {:<13} {detail}", s.game, s.source, s.state.label());
    }

    Ok(if report.success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
