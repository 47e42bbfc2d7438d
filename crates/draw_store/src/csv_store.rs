//! One CSV file per game under a data directory.
//!
//! Layout:
//!   <root>/<game>.csv                                   canonical store
//!   <root>/diagnostics/<game>.<source>.<ts>.raw.txt     raw upstream dumps
//!
//! Rewrites go through `<game>.csv.part` + rename, so a crash mid-write leaves
//! the previous store in place. Every row is re-rendered in canonical form on
//! rewrite, so hand-edited rows (`1 2 3 4 5`, `2x`) come back as `01 02 03 04 05`,
//! `2X`. Their values never change.

use crate::{DrawStore, StoreError};
use chrono::{NaiveDate, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use draw_core::{DrawRecord, Modifier};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CANONICAL_HEADER: [&str; 5] = ["draw_date", "numbers", "bonus", "secondary", "modifier"];

const DIAGNOSTICS_DIR: &str = "diagnostics";

#[derive(Debug, Serialize, Deserialize)]
struct StoredRow {
    draw_date: String,
    numbers: String,
    bonus: String,
    secondary: String,
    modifier: String,
}

fn join_run(run: &[u32]) -> String {
    run.iter().map(|n| format!("{n:02}")).collect::<Vec<_>>().join(" ")
}

fn split_run(field: &str) -> Result<Vec<u32>, String> {
    field
        .split_whitespace()
        .map(|t| t.parse::<u32>().map_err(|_| format!("bad number '{t}'")))
        .collect()
}

impl From<&DrawRecord> for StoredRow {
    fn from(r: &DrawRecord) -> Self {
        Self {
            draw_date: r.draw_date.format("%Y-%m-%d").to_string(),
            numbers: join_run(&r.numbers),
            bonus: r.bonus.map(|b| format!("{b:02}")).unwrap_or_default(),
            secondary: join_run(&r.secondary),
            modifier: r.modifier.to_string(),
        }
    }
}

impl StoredRow {
    fn into_record(self, game: &str) -> Result<DrawRecord, String> {
        let draw_date = NaiveDate::parse_from_str(&self.draw_date, "%Y-%m-%d")
            .map_err(|_| format!("bad date '{}'", self.draw_date))?;
        let numbers = split_run(&self.numbers)?;
        if numbers.is_empty() {
            return Err("empty numbers".into());
        }
        let bonus = match self.bonus.trim() {
            "" => None,
            b => Some(b.parse::<u32>().map_err(|_| format!("bad bonus '{b}'"))?),
        };

        Ok(DrawRecord {
            game: game.to_string(),
            draw_date,
            numbers,
            bonus,
            secondary: split_run(&self.secondary)?,
            modifier: Modifier::canonicalize(&self.modifier).map_err(|raw| format!("bad modifier '{raw}'"))?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CsvDrawStore {
    root: PathBuf,
}

impl CsvDrawStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_path(&self, game: &str) -> PathBuf {
        self.root.join(format!("{game}.csv"))
    }

    fn write_atomic(&self, path: &Path, rows: &[DrawRecord]) -> Result<(), StoreError> {
        let part = path.with_extension("csv.part");

        let result = (|| -> Result<(), StoreError> {
            let mut wtr = WriterBuilder::new().has_headers(false).from_path(&part)?;
            wtr.write_record(CANONICAL_HEADER)?;
            for r in rows {
                wtr.serialize(StoredRow::from(r))?;
            }
            wtr.flush()?;
            let file = wtr.into_inner().map_err(|e| StoreError::Io(e.to_string()))?;
            file.sync_all()?;
            Ok(())
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&part);
            return Err(e);
        }

        fs::rename(&part, path).map_err(|e| {
            let _ = fs::remove_file(&part);
            StoreError::Io(format!("rename {} → {}: {e}", part.display(), path.display()))
        })
    }
}

impl DrawStore for CsvDrawStore {
    fn load(&self, game: &str) -> Result<Vec<DrawRecord>, StoreError> {
        let path = self.store_path(game);
        if !path.exists() {
            debug!("no store yet at {}", path.display());
            return Ok(Vec::new());
        }

        let mut rdr = ReaderBuilder::new().from_path(&path)?;
        let header = rdr.headers()?.clone();
        if !header.iter().eq(CANONICAL_HEADER) {
            return Err(StoreError::Corrupt {
                path,
                line: 1,
                reason: format!("unexpected header {:?}", header.iter().collect::<Vec<_>>()),
            });
        }

        let mut out = Vec::new();
        for (i, row) in rdr.deserialize::<StoredRow>().enumerate() {
            let line = i as u64 + 2;
            let record = row
                .map_err(|e| e.to_string())
                .and_then(|r| r.into_record(game))
                .map_err(|reason| StoreError::Corrupt { path: path.clone(), line, reason })?;
            out.push(record);
        }
        Ok(out)
    }

    fn replace(&self, game: &str, rows: &[DrawRecord]) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.root)?;
        let path = self.store_path(game);
        self.write_atomic(&path, rows)?;
        Ok(path)
    }

    fn dump_diagnostic(&self, game: &str, source: &str, raw: &str) -> Result<PathBuf, StoreError> {
        let dir = self.root.join(DIAGNOSTICS_DIR);
        fs::create_dir_all(&dir)?;
        let ts = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let path = dir.join(format!("{game}.{source}.{ts}.raw.txt"));
        fs::write(&path, raw)?;
        Ok(path)
    }
}
