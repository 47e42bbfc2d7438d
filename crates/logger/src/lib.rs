/// Lotto ingest: Logger
/// JSONL run-event stream, one file per UTC day

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct EventLogger {
    log_dir: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir }
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event types ───────────────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct SourceStatusEvent {
    pub ts:            String,
    pub event:         &'static str,   // "SOURCE_STATUS"
    pub game:          String,
    pub source:        String,
    pub required:      bool,
    pub state:         String,         // "WRITTEN" | "FALLBACK_KEPT" | "FAILED"
    pub rows_added:    usize,
    pub rows_rejected: usize,
    pub message:       String,
    pub diagnostic:    Option<String>, // path of the raw dump, if one was saved
}

#[derive(Serialize, Debug)]
pub struct RunSummaryEvent {
    pub ts:             String,
    pub event:          &'static str,  // "RUN_SUMMARY"
    pub games:          usize,
    pub sources:        usize,
    pub written:        usize,
    pub kept_cached:    usize,
    pub failed:         usize,
    pub rows_added:     usize,
    pub success:        bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let logger = EventLogger::new(dir.path().join("logs"));
        let ev = RunSummaryEvent {
            ts: now_iso(),
            event: "RUN_SUMMARY",
            games: 2,
            sources: 2,
            written: 1,
            kept_cached: 1,
            failed: 0,
            rows_added: 7,
            success: true,
        };
        logger.log(&ev).unwrap();
        logger.log(&ev).unwrap();

        let date = Utc::now().format("%Y-%m-%d").to_string();
        let text = fs::read_to_string(dir.path().join("logs").join(format!("{date}.jsonl"))).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let v: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(v["event"], "RUN_SUMMARY");
        assert_eq!(v["rows_added"], 7);
    }
}
