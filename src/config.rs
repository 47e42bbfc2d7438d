//! Runtime settings (CLI + env + .env) and the game catalog (TOML).

use anyhow::{bail, Context, Result};
use clap::Parser;
use draw_adapters::{LandmarkAdapter, LandmarkGrammar, LandmarkScanner, SecondaryKind, SecondaryLandmark, SourceAdapter, TabularAdapter};
use draw_core::{BonusSpec, GameProfile, HeaderAliases};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Parser)]
#[command(name = "ingest", about = "Fetch, normalize and merge lottery draw history")]
pub struct Settings {
    /// Directory holding one <game>.csv store per game
    #[arg(long, env = "LOTTO_DATA_DIR", default_value = "data/nj")]
    pub data_dir: PathBuf,

    /// Directory for the JSONL run-event stream
    #[arg(long, env = "LOTTO_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Game catalog; the built-in catalog is used when the file does not exist
    #[arg(long, env = "LOTTO_GAMES_FILE", default_value = "config/games.toml")]
    pub games: PathBuf,

    /// Per-fetch timeout unless a source overrides it
    #[arg(long, env = "LOTTO_FETCH_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,

    /// Run only these games (default: all)
    pub only: Vec<String>,
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

// ── Catalog ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Tabular,
    Landmark,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    /// A fetch failure on a required source fails the whole run.
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Tabular only. Defaults to ','.
    #[serde(default)]
    pub delimiter: Option<char>,
    /// Landmark only.
    #[serde(default)]
    pub grammar: Option<LandmarkGrammar>,
}

impl SourceConfig {
    pub fn timeout(&self, default: Duration) -> Duration {
        self.timeout_secs.map(Duration::from_secs).unwrap_or(default)
    }

    pub fn adapter(&self) -> Box<dyn SourceAdapter + Send + Sync> {
        match self.kind {
            SourceKind::Tabular => {
                let delimiter = self.delimiter.filter(char::is_ascii).map(|c| c as u8).unwrap_or(b',');
                Box::new(TabularAdapter::new(delimiter))
            }
            SourceKind::Landmark => Box::new(LandmarkAdapter::new(self.grammar.clone().unwrap_or_default())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub profile: GameProfile,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub games: Vec<GameConfig>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Catalog {
    /// NJ draw games. Numeric domains cover every historical matrix present in
    /// the upstream archives, not just the current one.
    pub fn builtin() -> Self {
        let powerball = GameConfig {
            profile: GameProfile {
                game: "powerball".into(),
                arity: 5,
                min: 1,
                max: 69,
                bonus: Some(BonusSpec { min: 1, max: 39, embedded: true }),
                secondary_arity: None,
                modifier: true,
                aliases: HeaderAliases {
                    date: names(&["Draw Date", "draw_date"]),
                    numbers: names(&["Winning Numbers", "winning_numbers"]),
                    modifier: names(&["Multiplier", "multiplier"]),
                    ..Default::default()
                },
            },
            sources: vec![SourceConfig {
                name: "ny_open_data".into(),
                url: "https://data.ny.gov/api/views/d6yy-54nr/rows.csv?accessType=DOWNLOAD".into(),
                kind: SourceKind::Tabular,
                required: true,
                timeout_secs: None,
                delimiter: None,
                grammar: None,
            }],
        };

        let mega = GameConfig {
            profile: GameProfile {
                game: "mega_millions".into(),
                arity: 5,
                min: 1,
                max: 75,
                bonus: Some(BonusSpec { min: 1, max: 52, embedded: false }),
                secondary_arity: None,
                modifier: true,
                aliases: HeaderAliases {
                    date: names(&["Draw Date", "draw_date"]),
                    numbers: names(&["Winning Numbers", "winning_numbers", "white_numbers"]),
                    bonus: names(&["Mega Ball", "mega_ball"]),
                    modifier: names(&["Multiplier", "multiplier"]),
                    ..Default::default()
                },
            },
            sources: vec![SourceConfig {
                name: "ny_open_data".into(),
                url: "https://data.ny.gov/api/views/5xaw-6ayf/rows.csv?accessType=DOWNLOAD".into(),
                kind: SourceKind::Tabular,
                required: false,
                timeout_secs: None,
                delimiter: None,
                grammar: None,
            }],
        };

        let cash5 = GameConfig {
            profile: GameProfile {
                game: "jersey_cash5".into(),
                arity: 5,
                min: 1,
                max: 45,
                bonus: None,
                secondary_arity: None,
                modifier: true,
                aliases: HeaderAliases::default(),
            },
            sources: vec![SourceConfig {
                name: "njlottery".into(),
                url: "https://www.njlottery.com/en-us/drawgames/jerseycash5.html".into(),
                kind: SourceKind::Landmark,
                required: false,
                timeout_secs: None,
                delimiter: None,
                grammar: Some(LandmarkGrammar {
                    modifier_label: Some("XTRA".into()),
                    ..Default::default()
                }),
            }],
        };

        let pick6 = GameConfig {
            profile: GameProfile {
                game: "pick6".into(),
                arity: 6,
                min: 1,
                max: 46,
                bonus: None,
                secondary_arity: Some(6),
                modifier: false,
                aliases: HeaderAliases::default(),
            },
            sources: vec![SourceConfig {
                name: "njlottery".into(),
                url: "https://www.njlottery.com/en-us/drawgames/pick6.html".into(),
                kind: SourceKind::Landmark,
                required: false,
                timeout_secs: None,
                delimiter: None,
                grammar: Some(LandmarkGrammar {
                    secondary: Some(SecondaryLandmark { label: "Double Play".into(), kind: SecondaryKind::Run }),
                    ..Default::default()
                }),
            }],
        };

        Self { games: vec![powerball, mega, cash5, pick6] }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(text).context("game catalog parse failed")?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Reads `path`, or falls back to the built-in catalog when it is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No catalog at {}, using built-in games", path.display());
            return Ok(Self::builtin());
        }
        let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("catalog {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for g in &self.games {
            let p = &g.profile;
            if let Err(msg) = p.validate() {
                bail!("invalid game profile: {msg}");
            }
            if !seen.insert(p.game.as_str()) {
                bail!("duplicate game id '{}'", p.game);
            }

            let mut source_names = HashSet::new();
            for s in &g.sources {
                if s.name.trim().is_empty() || s.url.trim().is_empty() {
                    bail!("{}: source needs a name and a url", p.game);
                }
                if !source_names.insert(s.name.as_str()) {
                    bail!("{}: duplicate source '{}'", p.game, s.name);
                }
                match s.kind {
                    SourceKind::Tabular => {
                        if p.aliases.date.is_empty() || p.aliases.numbers.is_empty() {
                            bail!("{}/{}: tabular source needs date and numbers aliases", p.game, s.name);
                        }
                        if p.bonus.as_ref().is_some_and(|b| !b.embedded) && p.aliases.bonus.is_empty() {
                            bail!("{}/{}: tabular source needs bonus aliases", p.game, s.name);
                        }
                        if s.delimiter.is_some_and(|c| !c.is_ascii()) {
                            bail!("{}/{}: delimiter must be ASCII", p.game, s.name);
                        }
                    }
                    SourceKind::Landmark => {
                        let grammar = s.grammar.clone().unwrap_or_default();
                        if let Err(e) = LandmarkScanner::new(&grammar, p) {
                            bail!("{}/{}: {e}", p.game, s.name);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Keeps only the named games; unknown names are an error.
    pub fn only(mut self, games: &[String]) -> Result<Self> {
        if games.is_empty() {
            return Ok(self);
        }
        for name in games {
            if !self.games.iter().any(|g| &g.profile.game == name) {
                bail!("unknown game '{name}'");
            }
        }
        self.games.retain(|g| games.contains(&g.profile.game));
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let c = Catalog::builtin();
        c.validate().unwrap();
        assert_eq!(c.games.len(), 4);
        assert!(c.games[0].sources[0].required);
    }

    #[test]
    fn shipped_catalog_matches_builtin() {
        let text = include_str!("../config/games.toml");
        assert_eq!(Catalog::from_toml(text).unwrap(), Catalog::builtin());
    }

    #[test]
    fn parses_minimal_toml() {
        let text = r#"
            [[games]]
            [games.profile]
            game = "cash4life"
            arity = 5
            min = 1
            max = 60
            bonus = { min = 1, max = 4 }
            [games.profile.aliases]
            date = ["Draw Date"]
            numbers = ["Winning Numbers"]
            bonus = ["Cash Ball"]

            [[games.sources]]
            name = "ny"
            url = "https://example.invalid/rows.csv"
            kind = "tabular"
            delimiter = ";"
            timeout_secs = 5
        "#;
        let c = Catalog::from_toml(text).unwrap();
        let s = &c.games[0].sources[0];
        assert!(!s.required);
        assert_eq!(s.timeout(Duration::from_secs(60)), Duration::from_secs(5));
        assert_eq!(s.delimiter, Some(';'));
    }

    #[test]
    fn rejects_duplicate_games_and_bad_grammar() {
        let mut c = Catalog::builtin();
        c.games.push(c.games[0].clone());
        assert!(c.validate().is_err());

        let mut c = Catalog::builtin();
        // Jersey Cash 5 has no secondary run
        c.games[2].sources[0].grammar = Some(LandmarkGrammar {
            secondary: Some(SecondaryLandmark { label: "Double Play".into(), kind: SecondaryKind::Run }),
            ..Default::default()
        });
        assert!(c.validate().is_err());
    }

    #[test]
    fn only_filters_and_rejects_unknown() {
        let c = Catalog::builtin().only(&["pick6".to_string()]).unwrap();
        assert_eq!(c.games.len(), 1);
        assert!(Catalog::builtin().only(&["keno".to_string()]).is_err());
    }
}
