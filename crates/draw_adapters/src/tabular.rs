//! Header-keyed delimited sources (NY Open Data CSV exports and the like).
//!
//! Column names drift across providers and years, so every logical field is
//! resolved through the profile's alias list: first alias present in the
//! header AND non-empty in the row wins.

use crate::{Adapted, AdapterError, SourceAdapter};
use csv::{ReaderBuilder, StringRecord, Trim};
use draw_core::{CandidateRow, GameProfile};
use tracing::debug;

/// Splits a free-form numbers field on spaces, commas, semicolons, pipes or
/// dashes. Every remaining token must be all digits; the first one that is not
/// comes back as the error.
pub fn scan_number_tokens(field: &str) -> Result<Vec<&str>, &str> {
    field
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '|' | '-'))
        .filter(|t| !t.is_empty())
        .map(|t| {
            if t.bytes().all(|b| b.is_ascii_digit()) {
                Ok(t)
            } else {
                Err(t)
            }
        })
        .collect()
}

/// Column indexes for one logical field, in alias priority order.
#[derive(Debug, Default)]
struct FieldColumns(Vec<usize>);

impl FieldColumns {
    fn resolve(header: &StringRecord, aliases: &[String]) -> Self {
        let idx = aliases
            .iter()
            .filter_map(|alias| {
                header
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(alias.trim()))
            })
            .collect();
        Self(idx)
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn first_value<'r>(&self, row: &'r StringRecord) -> Option<&'r str> {
        self.0
            .iter()
            .filter_map(|&i| row.get(i))
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

struct Columns {
    date: FieldColumns,
    numbers: FieldColumns,
    bonus: FieldColumns,
    secondary: FieldColumns,
    modifier: FieldColumns,
}

#[derive(Debug, Clone)]
pub struct TabularAdapter {
    delimiter: u8,
}

impl Default for TabularAdapter {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl TabularAdapter {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    fn candidate(&self, cols: &Columns, row: &StringRecord, profile: &GameProfile) -> Result<CandidateRow, String> {
        let date = cols.date.first_value(row).ok_or("missing draw date")?;
        let numbers_field = cols.numbers.first_value(row).ok_or("missing numbers")?;

        let numbers = scan_number_tokens(numbers_field).map_err(|t| format!("non-numeric token '{t}'"))?;
        let expected = profile.primary_run_len();
        if numbers.len() != expected {
            return Err(format!("expected {expected} numbers, found {}", numbers.len()));
        }

        let mut cand = CandidateRow {
            date: date.to_string(),
            numbers: numbers.into_iter().map(String::from).collect(),
            bonus: None,
            secondary: Vec::new(),
            modifier: cols.modifier.first_value(row).map(String::from),
        };

        if profile.embeds_bonus() {
            cand.split_embedded_bonus();
        } else if profile.bonus.is_some() {
            cand.bonus = Some(cols.bonus.first_value(row).ok_or("missing bonus")?.to_string());
        }

        if let Some(field) = cols.secondary.first_value(row) {
            cand.secondary = scan_number_tokens(field)
                .map_err(|t| format!("non-numeric secondary token '{t}'"))?
                .into_iter()
                .map(String::from)
                .collect();
        }

        Ok(cand)
    }
}

impl SourceAdapter for TabularAdapter {
    fn adapt(&self, raw: &str, profile: &GameProfile) -> Result<Adapted, AdapterError> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(raw.as_bytes());

        let header = rdr
            .headers()
            .map_err(|e| AdapterError::Malformed(e.to_string()))?
            .clone();
        let header_names = || header.iter().map(String::from).collect::<Vec<_>>();

        let aliases = &profile.aliases;
        let cols = Columns {
            date: FieldColumns::resolve(&header, &aliases.date),
            numbers: FieldColumns::resolve(&header, &aliases.numbers),
            bonus: FieldColumns::resolve(&header, &aliases.bonus),
            secondary: FieldColumns::resolve(&header, &aliases.secondary),
            modifier: FieldColumns::resolve(&header, &aliases.modifier),
        };

        if cols.date.is_empty() {
            return Err(AdapterError::SchemaMismatch { field: "draw_date", headers: header_names() });
        }
        if cols.numbers.is_empty() {
            return Err(AdapterError::SchemaMismatch { field: "numbers", headers: header_names() });
        }
        if profile.bonus.is_some() && !profile.embeds_bonus() && cols.bonus.is_empty() {
            return Err(AdapterError::SchemaMismatch { field: "bonus", headers: header_names() });
        }

        let mut out = Adapted::default();
        for (line, record) in rdr.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    debug!(game = %profile.game, line = line + 2, "unreadable row: {e}");
                    out.discarded += 1;
                    continue;
                }
            };
            match self.candidate(&cols, &record, profile) {
                Ok(c) => out.rows.push(c),
                Err(reason) => {
                    debug!(game = %profile.game, line = line + 2, "row skipped: {reason}");
                    out.discarded += 1;
                }
            }
        }

        if out.rows.is_empty() {
            return Err(AdapterError::NoUsableRows { skipped: out.discarded });
        }
        Ok(out)
    }
}
