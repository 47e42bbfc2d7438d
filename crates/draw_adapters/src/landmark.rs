//! Landmark extraction for markup sources.
//!
//! The page is flattened to text (tags dropped, entities decoded, script and
//! style bodies skipped), lexed into landmarks, and fed through a small state
//! machine:
//!
//! ```text
//!   Idle ──date──▶ Primary ──run complete──▶ Trailing ──▶ emit
//!                     │                        │  ├─secondary label──▶ Secondary ──run complete──▶ Trailing
//!                     │                        │  └─modifier label───▶ Modifier ──number──▶ Trailing
//!                     └─window / break─▶ discard (partial)
//! ```
//!
//! Every draft is bounded by `window` bytes measured from its date landmark.
//! Runs stop at exactly the declared arity, so one match never swallows the
//! next draw. A run must be contiguous: any word text between two landmarks
//! (`10 PM Drawing`, `$2 Million`) is a break, and a break after the first
//! ball throws the collected balls away and starts the run again.

use crate::{Adapted, AdapterError, SourceAdapter};
use draw_core::{CandidateRow, GameProfile};
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DATE_PATTERN: &str = r"\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}/\d{1,2}/\d{4}\b|\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}\b";

/// Bare digit groups, commas allowed (`05,12` and `1,000,000` both land here,
/// only the former yields number landmarks).
const NUMBER_PATTERN: &str = r"\d[\d,.:]*\d|\d";

pub const DEFAULT_WINDOW: usize = 400;

fn default_window() -> usize {
    DEFAULT_WINDOW
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryKind {
    /// Single number after the label goes to `bonus`.
    Bonus,
    /// A run of `secondary_arity` numbers (Double Play).
    Run,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryLandmark {
    pub label: String,
    pub kind: SecondaryKind,
}

/// Source-specific landmark grammar. Derived from captured fixtures of each
/// page, not from any DOM contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkGrammar {
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default)]
    pub secondary: Option<SecondaryLandmark>,
    #[serde(default)]
    pub modifier_label: Option<String>,
}

impl Default for LandmarkGrammar {
    fn default() -> Self {
        Self { window: DEFAULT_WINDOW, secondary: None, modifier_label: None }
    }
}

// ── Lexer ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Landmark<'t> {
    Date(&'t str),
    Number(&'t str),
    SecondaryLabel,
    ModifierLabel,
    /// Digits that are not a lottery number (amounts, times, years).
    Noise,
    /// Non-separator text between two landmarks.
    Break,
}

#[derive(Debug, Clone)]
struct Token<'t> {
    at: usize,
    kind: Landmark<'t>,
}

/// Text allowed between the balls of one run.
fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | ';' | ':' | '|' | '/' | '-' | '–' | '•' | '·')
}

fn label_pattern(label: &str) -> String {
    regex::escape(label.trim()).split_whitespace().collect::<Vec<_>>().join(r"\s+")
}

// ── Scanner ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ScanReport {
    pub rows: Vec<CandidateRow>,
    /// Drafts discarded for wrong arity / broken runs / window overrun.
    pub partial: usize,
}

#[derive(Debug)]
struct Draft {
    at: usize,
    row: CandidateRow,
    secondary_done: bool,
    modifier_done: bool,
}

enum State {
    Idle,
    Primary(Draft),
    Trailing(Draft),
    Secondary(Draft, Vec<String>),
    Modifier(Draft),
}

pub struct LandmarkScanner {
    lexer: Regex,
    window: usize,
    run_len: usize,
    secondary: Option<(SecondaryKind, usize)>,
    wants_modifier: bool,
    embedded_bonus: bool,
}

impl LandmarkScanner {
    pub fn new(grammar: &LandmarkGrammar, profile: &GameProfile) -> Result<Self, AdapterError> {
        let secondary = match &grammar.secondary {
            None => None,
            Some(s) if s.label.trim().is_empty() => {
                return Err(AdapterError::Grammar("secondary label is empty".into()))
            }
            Some(SecondaryLandmark { kind: SecondaryKind::Bonus, .. }) => {
                if profile.bonus.is_none() {
                    return Err(AdapterError::Grammar(format!("{} defines no bonus ball", profile.game)));
                }
                Some((SecondaryKind::Bonus, 1))
            }
            Some(SecondaryLandmark { kind: SecondaryKind::Run, .. }) => match profile.secondary_arity {
                Some(n) => Some((SecondaryKind::Run, n)),
                None => {
                    return Err(AdapterError::Grammar(format!("{} defines no secondary run", profile.game)))
                }
            },
        };

        let mut pattern = format!(r"(?i)(?P<date>{DATE_PATTERN})");
        if let Some(s) = &grammar.secondary {
            pattern.push_str(&format!(r"|(?P<secondary>\b{}\b)", label_pattern(&s.label)));
        }
        if let Some(label) = grammar.modifier_label.as_deref().filter(|l| !l.trim().is_empty()) {
            pattern.push_str(&format!(r"|(?P<modifier>\b{}\b)", label_pattern(label)));
        }
        pattern.push_str(&format!(r"|(?P<num>{NUMBER_PATTERN})"));

        let lexer = Regex::new(&pattern).map_err(|e| AdapterError::Grammar(e.to_string()))?;

        Ok(Self {
            lexer,
            window: grammar.window,
            run_len: profile.primary_run_len(),
            secondary,
            wants_modifier: grammar.modifier_label.is_some() && profile.modifier,
            embedded_bonus: profile.embeds_bonus(),
        })
    }

    fn lex<'t>(&self, text: &'t str) -> Vec<Token<'t>> {
        let mut out = Vec::new();
        let mut last_end = 0;
        for caps in self.lexer.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if !out.is_empty() && !text[last_end..whole.start()].chars().all(is_separator) {
                out.push(Token { at: last_end, kind: Landmark::Break });
            }
            last_end = whole.end();

            if let Some(m) = caps.name("date") {
                out.push(Token { at: m.start(), kind: Landmark::Date(m.as_str()) });
            } else if let Some(m) = caps.name("secondary") {
                out.push(Token { at: m.start(), kind: Landmark::SecondaryLabel });
            } else if let Some(m) = caps.name("modifier") {
                out.push(Token { at: m.start(), kind: Landmark::ModifierLabel });
            } else if let Some(m) = caps.name("num") {
                let raw = m.as_str();
                let groups: Vec<&str> = raw.split(',').collect();
                if groups.iter().all(|g| (1..=2).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit())) {
                    let mut offset = m.start();
                    for g in groups {
                        out.push(Token { at: offset, kind: Landmark::Number(g) });
                        offset += g.len() + 1;
                    }
                } else {
                    out.push(Token { at: m.start(), kind: Landmark::Noise });
                }
            }
        }
        out
    }

    fn is_complete(&self, d: &Draft) -> bool {
        (self.secondary.is_none() || d.secondary_done) && (!self.wants_modifier || d.modifier_done)
    }

    fn emit(&self, mut draft: Draft, report: &mut ScanReport) {
        if self.embedded_bonus {
            draft.row.split_embedded_bonus();
        }
        report.rows.push(draft.row);
    }

    fn start(at: usize, date: &str) -> State {
        State::Primary(Draft {
            at,
            row: CandidateRow { date: date.to_string(), ..Default::default() },
            secondary_done: false,
            modifier_done: false,
        })
    }

    /// One transition. Returns the next state and whether `tok` must be fed
    /// again (it closed the previous draft without being consumed).
    fn step(&self, state: State, tok: &Token<'_>, report: &mut ScanReport) -> (State, bool) {
        let expired = |d: &Draft| tok.at > d.at + self.window;

        match state {
            State::Idle => match tok.kind {
                Landmark::Date(date) => (Self::start(tok.at, date), false),
                _ => (State::Idle, false),
            },

            State::Primary(mut d) => {
                if expired(&d) {
                    report.partial += usize::from(!d.row.numbers.is_empty());
                    return (State::Idle, true);
                }
                match tok.kind {
                    Landmark::Number(n) => {
                        d.row.numbers.push(n.to_string());
                        if d.row.numbers.len() == self.run_len {
                            if self.is_complete(&d) {
                                self.emit(d, report);
                                (State::Idle, false)
                            } else {
                                (State::Trailing(d), false)
                            }
                        } else {
                            (State::Primary(d), false)
                        }
                    }
                    // a jackpot amount between the date and the first ball is fine
                    Landmark::Noise if d.row.numbers.is_empty() => (State::Primary(d), false),
                    Landmark::Break => {
                        if !d.row.numbers.is_empty() {
                            report.partial += 1;
                            d.row.numbers.clear();
                        }
                        (State::Primary(d), false)
                    }
                    _ => {
                        report.partial += usize::from(!d.row.numbers.is_empty());
                        (State::Idle, true)
                    }
                }
            }

            State::Trailing(d) => {
                if expired(&d) {
                    self.emit(d, report);
                    return (State::Idle, true);
                }
                match tok.kind {
                    Landmark::SecondaryLabel if !d.secondary_done => (State::Secondary(d, Vec::new()), false),
                    Landmark::ModifierLabel if !d.modifier_done => (State::Modifier(d), false),
                    Landmark::Date(_) => {
                        self.emit(d, report);
                        (State::Idle, true)
                    }
                    // repeated labels or stray digits: nothing more to attach
                    _ => (State::Trailing(d), false),
                }
            }

            State::Secondary(mut d, mut run) => {
                let Some((kind, len)) = self.secondary else {
                    return (State::Trailing(d), true);
                };
                if expired(&d) {
                    report.partial += 1;
                    return (State::Idle, true);
                }
                match tok.kind {
                    Landmark::Number(n) => {
                        run.push(n.to_string());
                        if run.len() < len {
                            return (State::Secondary(d, run), false);
                        }
                        match kind {
                            SecondaryKind::Bonus => d.row.bonus = run.pop(),
                            SecondaryKind::Run => d.row.secondary = run,
                        }
                        d.secondary_done = true;
                        if self.is_complete(&d) {
                            self.emit(d, report);
                            (State::Idle, false)
                        } else {
                            (State::Trailing(d), false)
                        }
                    }
                    Landmark::Noise | Landmark::Break if run.is_empty() => (State::Secondary(d, run), false),
                    _ => {
                        report.partial += 1;
                        (State::Idle, true)
                    }
                }
            }

            State::Modifier(mut d) => {
                if expired(&d) {
                    self.emit(d, report);
                    return (State::Idle, true);
                }
                match tok.kind {
                    Landmark::Number(n) => {
                        d.row.modifier = Some(n.to_string());
                        d.modifier_done = true;
                        if self.is_complete(&d) {
                            self.emit(d, report);
                            (State::Idle, false)
                        } else {
                            (State::Trailing(d), false)
                        }
                    }
                    Landmark::Date(_) => {
                        self.emit(d, report);
                        (State::Idle, true)
                    }
                    _ => {
                        d.modifier_done = true;
                        (State::Trailing(d), true)
                    }
                }
            }
        }
    }

    /// Scans already-flattened text.
    pub fn scan(&self, text: &str) -> ScanReport {
        let mut report = ScanReport::default();
        let mut state = State::Idle;

        for tok in self.lex(text) {
            loop {
                let (next, again) = self.step(state, &tok, &mut report);
                state = next;
                if !again {
                    break;
                }
            }
        }

        match state {
            State::Trailing(d) | State::Modifier(d) => self.emit(d, &mut report),
            State::Primary(d) if !d.row.numbers.is_empty() => report.partial += 1,
            State::Secondary(..) => report.partial += 1,
            _ => {}
        }
        report
    }
}

/// Drops tags and decodes entities; text of `<script>` / `<style>` is skipped.
pub fn flatten_markup(raw: &str) -> String {
    let doc = Html::parse_document(raw);
    let mut out = String::with_capacity(raw.len() / 2);
    for node in doc.tree.root().descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let in_code = node
            .parent()
            .and_then(|p| p.value().as_element())
            .is_some_and(|e| matches!(e.name(), "script" | "style"));
        if !in_code {
            out.push_str(text);
            out.push(' ');
        }
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct LandmarkAdapter {
    grammar: LandmarkGrammar,
}

impl LandmarkAdapter {
    pub fn new(grammar: LandmarkGrammar) -> Self {
        Self { grammar }
    }
}

impl SourceAdapter for LandmarkAdapter {
    fn adapt(&self, raw: &str, profile: &GameProfile) -> Result<Adapted, AdapterError> {
        let scanner = LandmarkScanner::new(&self.grammar, profile)?;
        let text = flatten_markup(raw);
        let report = scanner.scan(&text);

        debug!(
            game = %profile.game,
            matches = report.rows.len(),
            partial = report.partial,
            "landmark scan done"
        );

        if report.rows.is_empty() {
            return Err(AdapterError::ExtractionFailure { partial: report.partial });
        }
        Ok(Adapted { rows: report.rows, discarded: report.partial })
    }
}
