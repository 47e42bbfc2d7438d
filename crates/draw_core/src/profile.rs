use serde::{Deserialize, Serialize};

/// Per-game shape: arity, numeric domain, optional bonus / secondary run,
/// and the header aliases tabular sources may use for each logical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameProfile {
    pub game: String,
    pub arity: usize,
    pub min: u32,
    pub max: u32,
    #[serde(default)]
    pub bonus: Option<BonusSpec>,
    /// Arity of the optional second run (Pick-6 Double Play).
    #[serde(default)]
    pub secondary_arity: Option<usize>,
    /// Whether draws carry a multiplier / extra value.
    #[serde(default)]
    pub modifier: bool,
    #[serde(default)]
    pub aliases: HeaderAliases,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusSpec {
    pub min: u32,
    pub max: u32,
    /// Bonus printed as the trailing token of the numbers field.
    #[serde(default)]
    pub embedded: bool,
}

/// Candidate column names per logical field, highest priority first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderAliases {
    #[serde(default)]
    pub date: Vec<String>,
    #[serde(default)]
    pub numbers: Vec<String>,
    #[serde(default)]
    pub bonus: Vec<String>,
    #[serde(default)]
    pub secondary: Vec<String>,
    #[serde(default)]
    pub modifier: Vec<String>,
}

impl GameProfile {
    pub fn in_domain(&self, n: u32) -> bool {
        (self.min..=self.max).contains(&n)
    }

    pub fn bonus_in_domain(&self, n: u32) -> bool {
        self.bonus
            .as_ref()
            .is_some_and(|b| (b.min..=b.max).contains(&n))
    }

    pub fn embeds_bonus(&self) -> bool {
        self.bonus.as_ref().is_some_and(|b| b.embedded)
    }

    /// Token count a source prints for the primary run.
    pub fn primary_run_len(&self) -> usize {
        if self.embeds_bonus() {
            self.arity + 1
        } else {
            self.arity
        }
    }

    /// Config-level sanity checks. Returns a human readable reason.
    pub fn validate(&self) -> Result<(), String> {
        if self.game.trim().is_empty() {
            return Err("game id is empty".into());
        }
        if self.arity == 0 {
            return Err(format!("{}: arity must be > 0", self.game));
        }
        if self.min > self.max {
            return Err(format!("{}: domain {}..={} is inverted", self.game, self.min, self.max));
        }
        if let Some(b) = &self.bonus {
            if b.min > b.max {
                return Err(format!("{}: bonus domain {}..={} is inverted", self.game, b.min, b.max));
            }
        }
        if self.secondary_arity == Some(0) {
            return Err(format!("{}: secondary arity must be > 0", self.game));
        }
        Ok(())
    }
}
