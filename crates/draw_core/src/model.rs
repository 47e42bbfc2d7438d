use chrono::NaiveDate;
use std::fmt;

// ── Modifier ─────────────────────────────────────────────────────────────────

/// Per-draw multiplier / extra value. Never blank: absent values are
/// `NotApplicable`, rendered as `N/A`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Modifier {
    #[default]
    NotApplicable,
    Multiplier(u32),
}

impl Modifier {
    pub const SENTINEL: &'static str = "N/A";
    pub const SUFFIX: char = 'X';

    /// `""`, `NA`, `N/A`, `None` → sentinel. Anything else keeps its leading
    /// digit run (`2`, `2X`, `x2`, `2x Power Play` → `2X`). A digit run too
    /// large for a multiplier is an error, never the sentinel.
    pub fn canonicalize(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("na")
            || trimmed.eq_ignore_ascii_case("n/a")
            || trimmed.eq_ignore_ascii_case("none")
        {
            return Ok(Modifier::NotApplicable);
        }

        let body = trimmed
            .strip_prefix(|c: char| c.eq_ignore_ascii_case(&'x'))
            .unwrap_or(trimmed)
            .trim_start();
        let digits: String = body.chars().take_while(|c| c.is_ascii_digit()).collect();

        if digits.is_empty() {
            return Ok(Modifier::NotApplicable);
        }
        digits
            .parse::<u32>()
            .map(Modifier::Multiplier)
            .map_err(|_| trimmed.to_string())
    }

    pub fn is_applicable(&self) -> bool {
        matches!(self, Modifier::Multiplier(_))
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::NotApplicable => f.write_str(Self::SENTINEL),
            Modifier::Multiplier(n) => write!(f, "{n}{}", Self::SUFFIX),
        }
    }
}

// ── Candidate row (adapter output) ───────────────────────────────────────────

/// Loosely typed row as produced by an adapter. Nothing here is validated yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateRow {
    pub date: String,
    pub numbers: Vec<String>,
    pub bonus: Option<String>,
    pub secondary: Vec<String>,
    pub modifier: Option<String>,
}

impl CandidateRow {
    /// Moves the trailing token of `numbers` into `bonus`.
    /// Used for sources that print the bonus ball as the last number.
    pub fn split_embedded_bonus(&mut self) {
        if self.bonus.is_none() {
            self.bonus = self.numbers.pop();
        }
    }
}

// ── Canonical record ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRecord {
    pub game: String,
    pub draw_date: NaiveDate,
    pub numbers: Vec<u32>,
    pub bonus: Option<u32>,
    /// Second run of the same shape (Pick-6 Double Play). Empty when absent.
    pub secondary: Vec<u32>,
    pub modifier: Modifier,
}

/// `(game, draw_date, numbers)`: unique within a persisted store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub game: String,
    pub draw_date: NaiveDate,
    pub numbers: Vec<u32>,
}

impl DrawRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            game: self.game.clone(),
            draw_date: self.draw_date,
            numbers: self.numbers.clone(),
        }
    }

    /// Inverse of normalization. Feeding this back through the normalizer
    /// yields an identical record.
    pub fn to_candidate(&self) -> CandidateRow {
        CandidateRow {
            date: self.draw_date.format("%Y-%m-%d").to_string(),
            numbers: self.numbers.iter().map(|n| format!("{n:02}")).collect(),
            bonus: self.bonus.map(|b| b.to_string()),
            secondary: self.secondary.iter().map(|n| format!("{n:02}")).collect(),
            modifier: Some(self.modifier.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_applicable_spellings_share_sentinel() {
        for raw in ["", "  ", "NA", "na", "N/A", "n/a", "None", "NONE"] {
            assert_eq!(Modifier::canonicalize(raw), Ok(Modifier::NotApplicable), "{raw:?}");
        }
        assert_eq!(Modifier::NotApplicable.to_string(), "N/A");
    }

    #[test]
    fn multiplier_spellings_share_token() {
        assert_eq!(Modifier::canonicalize("2"), Modifier::canonicalize("2X"));
        assert_eq!(Modifier::canonicalize("2x").unwrap().to_string(), "2X");
        assert_eq!(Modifier::canonicalize("x3").unwrap().to_string(), "3X");
        assert_eq!(Modifier::canonicalize("10x Power Play").unwrap().to_string(), "10X");
        assert_eq!(Modifier::canonicalize("Power Play"), Ok(Modifier::NotApplicable));
    }

    #[test]
    fn oversized_multiplier_is_an_error_not_the_sentinel() {
        assert_eq!(Modifier::canonicalize("99999999999X"), Err("99999999999X".to_string()));
        assert_eq!(Modifier::canonicalize("4294967295"), Ok(Modifier::Multiplier(u32::MAX)));
    }

    #[test]
    fn canonical_token_is_fixed_point() {
        for raw in ["", "N/A", "2", "2X", "05", "x4"] {
            let once = Modifier::canonicalize(raw).unwrap().to_string();
            let twice = Modifier::canonicalize(&once).unwrap().to_string();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn split_embedded_bonus_takes_last_token() {
        let mut row = CandidateRow {
            date: "2022-12-31".into(),
            numbers: ["05", "20", "34", "39", "62", "01"].map(String::from).to_vec(),
            ..Default::default()
        };
        row.split_embedded_bonus();
        assert_eq!(row.numbers.len(), 5);
        assert_eq!(row.bonus.as_deref(), Some("01"));
    }
}
