//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section has defaults, so an empty file yields the built-in engine
//! settings and league thresholds.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

use crate::math::{KellyConfig, DEFAULT_KELLY_FRACTION};
use crate::strategy::heads::HeadsConfig;
use crate::types::{LeagueParameters, Sport};

/// Env var overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "SHARPEDGE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub batch: BatchConfig,
    /// Per-league threshold overrides keyed by sport ("nba", "nfl", ...).
    pub leagues: HashMap<String, LeagueOverrides>,
    pub logging: LoggingConfig,
}

/// Settings passed explicitly to the analyzer.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub bankroll: f64,
    pub kelly_fraction: f64,
    /// Maximum stake as a fraction of bankroll.
    pub max_bet_pct: f64,
    /// Minimum stake in currency.
    pub min_bet_size: f64,
    /// Grade picks with the confluence scorer when a track record is supplied.
    pub confluence: bool,
    pub heads: HeadsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bankroll: 1000.0,
            kelly_fraction: DEFAULT_KELLY_FRACTION,
            max_bet_pct: 0.05,
            min_bet_size: 1.0,
            confluence: true,
            heads: HeadsConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn kelly(&self) -> KellyConfig {
        KellyConfig {
            multiplier: self.kelly_fraction,
            max_bet_pct: self.max_bet_pct,
            min_bet_size: self.min_bet_size,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// Games analyzed at once.
    pub max_concurrency: usize,
    /// Lifetime of memoized analyses; 0 disables the cache.
    pub cache_ttl_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            cache_ttl_secs: 300,
        }
    }
}

/// Partial league thresholds layered over the built-in defaults.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct LeagueOverrides {
    pub min_deviation_spread: Option<f64>,
    pub min_deviation_total: Option<f64>,
    pub min_ev_spread: Option<f64>,
    pub min_ev_total: Option<f64>,
    pub min_ev_moneyline_favorite: Option<f64>,
    pub min_ev_moneyline_underdog: Option<f64>,
    pub max_favorite_price: Option<f64>,
    pub max_juice: Option<f64>,
}

impl LeagueOverrides {
    pub fn apply(&self, base: LeagueParameters) -> LeagueParameters {
        LeagueParameters {
            min_deviation_spread: self.min_deviation_spread.unwrap_or(base.min_deviation_spread),
            min_deviation_total: self.min_deviation_total.unwrap_or(base.min_deviation_total),
            min_ev_spread: self.min_ev_spread.unwrap_or(base.min_ev_spread),
            min_ev_total: self.min_ev_total.unwrap_or(base.min_ev_total),
            min_ev_moneyline_favorite: self
                .min_ev_moneyline_favorite
                .unwrap_or(base.min_ev_moneyline_favorite),
            min_ev_moneyline_underdog: self
                .min_ev_moneyline_underdog
                .unwrap_or(base.min_ev_moneyline_underdog),
            max_favorite_price: self.max_favorite_price.unwrap_or(base.max_favorite_price),
            max_juice: self.max_juice.unwrap_or(base.max_juice),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "sharpedge=info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Path from `SHARPEDGE_CONFIG`, falling back to `config.toml`.
    pub fn default_path() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    fn validate(&self) -> Result<()> {
        for key in self.leagues.keys() {
            key.parse::<Sport>()
                .with_context(|| format!("Invalid league table [leagues.{key}]"))?;
        }
        let e = &self.engine;
        anyhow::ensure!(e.bankroll >= 0.0, "engine.bankroll must be non-negative");
        anyhow::ensure!(
            (0.0..=1.0).contains(&e.kelly_fraction),
            "engine.kelly_fraction must be within [0, 1]"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&e.max_bet_pct),
            "engine.max_bet_pct must be within [0, 1]"
        );
        anyhow::ensure!(
            e.heads.slippage_cents >= 0.0,
            "engine.heads.slippage_cents must be non-negative"
        );
        anyhow::ensure!(
            e.heads.min_structural_pct <= e.heads.max_structural_pct,
            "engine.heads.min_structural_pct exceeds max_structural_pct"
        );
        Ok(())
    }

    /// Thresholds for `sport`: built-in defaults plus any configured overrides.
    pub fn league_params(&self, sport: Sport) -> LeagueParameters {
        let base = LeagueParameters::defaults_for(sport);
        self.leagues
            .iter()
            .find(|(key, _)| key.parse::<Sport>().ok() == Some(sport))
            .map(|(_, overrides)| overrides.apply(base.clone()))
            .unwrap_or(base)
    }
}
