//! Candidate row → canonical `DrawRecord`.
//!
//! Rejection is row-local: the `Normalizer` counts rejected rows and moves on,
//! a batch is never aborted because one row is bad.

use crate::model::{CandidateRow, DrawRecord, Modifier};
use crate::profile::GameProfile;
use chrono::NaiveDate;
use std::fmt;
use tracing::debug;

/// Whole-string formats, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Month-name formats used by markup sources (`December 31, 2022`).
/// Commas and periods are stripped before these are tried.
const MONTH_NAME_FORMATS: &[&str] = &["%B %d %Y", "%b %d %Y"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    MissingField(&'static str),
    BadDate(String),
    NotNumeric(String),
    Arity { field: &'static str, expected: usize, found: usize },
    OutOfRange { field: &'static str, value: u32 },
    MissingBonus,
    BadModifier(String),
}

impl fmt::Display for RowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing field '{field}'"),
            Self::BadDate(raw) => write!(f, "unrecognised date '{raw}'"),
            Self::NotNumeric(tok) => write!(f, "non-numeric token '{tok}'"),
            Self::Arity { field, expected, found } => {
                write!(f, "{field}: expected {expected} numbers, found {found}")
            }
            Self::OutOfRange { field, value } => write!(f, "{field}: {value} outside game domain"),
            Self::MissingBonus => write!(f, "bonus ball missing"),
            Self::BadModifier(raw) => write!(f, "modifier '{raw}' out of range"),
        }
    }
}

impl std::error::Error for RowRejection {}

/// Parses a draw date. Order: `YYYY-MM-DD`, `MM/DD/YYYY`, either of those
/// with a trailing time component (`2022-12-31T00:00:00.000`), then month names.
pub fn canonical_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    // truncate at the date boundary
    if let Some(head) = s.split(|c: char| c == 'T' || c == ' ').next().filter(|h| h.len() < s.len()) {
        for fmt in DATE_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(head, fmt) {
                return Some(d);
            }
        }
    }

    let cleaned: String = s.chars().filter(|c| *c != ',' && *c != '.').collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    MONTH_NAME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
}

fn parse_run(
    tokens: &[String],
    field: &'static str,
    expected: usize,
    in_domain: impl Fn(u32) -> bool,
) -> Result<Vec<u32>, RowRejection> {
    let mut out = Vec::with_capacity(tokens.len());
    for tok in tokens {
        let t = tok.trim();
        let n = t
            .parse::<u32>()
            .map_err(|_| RowRejection::NotNumeric(t.to_string()))?;
        out.push(n);
    }
    if out.len() != expected {
        return Err(RowRejection::Arity { field, expected, found: out.len() });
    }
    if let Some(&value) = out.iter().find(|n| !in_domain(**n)) {
        return Err(RowRejection::OutOfRange { field, value });
    }
    Ok(out)
}

/// Single-row contract: canonical record or the reason it was rejected.
pub fn normalize(row: &CandidateRow, profile: &GameProfile) -> Result<DrawRecord, RowRejection> {
    if row.date.trim().is_empty() {
        return Err(RowRejection::MissingField("draw_date"));
    }
    let draw_date = canonical_date(&row.date).ok_or_else(|| RowRejection::BadDate(row.date.clone()))?;

    if row.numbers.is_empty() {
        return Err(RowRejection::MissingField("numbers"));
    }
    let numbers = parse_run(&row.numbers, "numbers", profile.arity, |n| profile.in_domain(n))?;

    let bonus = match &profile.bonus {
        None => None,
        Some(_) => {
            let raw = row
                .bonus
                .as_deref()
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .ok_or(RowRejection::MissingBonus)?;
            let value = raw
                .parse::<u32>()
                .map_err(|_| RowRejection::NotNumeric(raw.to_string()))?;
            if !profile.bonus_in_domain(value) {
                return Err(RowRejection::OutOfRange { field: "bonus", value });
            }
            Some(value)
        }
    };

    let secondary = match profile.secondary_arity {
        Some(arity) if !row.secondary.is_empty() => {
            parse_run(&row.secondary, "secondary", arity, |n| profile.in_domain(n))?
        }
        _ => Vec::new(),
    };

    let modifier = if profile.modifier {
        Modifier::canonicalize(row.modifier.as_deref().unwrap_or("")).map_err(RowRejection::BadModifier)?
    } else {
        Modifier::NotApplicable
    };

    Ok(DrawRecord {
        game: profile.game.clone(),
        draw_date,
        numbers,
        bonus,
        secondary,
        modifier,
    })
}

/// Batch normalizer bound to one game profile. Keeps a rejected-row count.
pub struct Normalizer<'a> {
    profile: &'a GameProfile,
    rejected: usize,
}

impl<'a> Normalizer<'a> {
    pub fn new(profile: &'a GameProfile) -> Self {
        Self { profile, rejected: 0 }
    }

    pub fn normalize(&mut self, row: &CandidateRow) -> Option<DrawRecord> {
        match normalize(row, self.profile) {
            Ok(rec) => Some(rec),
            Err(reason) => {
                self.rejected += 1;
                debug!(game = %self.profile.game, date = %row.date, "row rejected: {reason}");
                None
            }
        }
    }

    pub fn normalize_all(&mut self, rows: &[CandidateRow]) -> Vec<DrawRecord> {
        rows.iter().filter_map(|r| self.normalize(r)).collect()
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}
