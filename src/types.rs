//! Shared types for the SHARPEDGE engine.
//!
//! These types form the data model consumed and produced by the model,
//! math and strategy modules. Inputs (`GameInput`, `SharpFactor`,
//! `LeagueParameters`) are built by external collaborators and never
//! mutated by the core.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::strategy::confluence::ConfluenceResult;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Sport/league a game belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Nba,
    Ncaab,
    Nfl,
    Ncaaf,
    Nhl,
    Mlb,
}

impl Sport {
    /// All known sports (useful for iteration).
    pub const ALL: &'static [Sport] = &[
        Sport::Nba,
        Sport::Ncaab,
        Sport::Nfl,
        Sport::Ncaaf,
        Sport::Nhl,
        Sport::Mlb,
    ];

    /// League-average scoring opportunities per team per game, scaled so
    /// that league-average ratings (110) reproduce typical scoring.
    pub fn league_average_pace(&self) -> f64 {
        match self {
            Sport::Nba => 99.0,
            Sport::Ncaab => 68.0,
            Sport::Nfl => 18.6,
            Sport::Ncaaf => 23.0,
            Sport::Nhl => 2.5,
            Sport::Mlb => 3.7,
        }
    }

    /// Regulation length used to normalize player minutes (innings for MLB).
    pub fn regulation_minutes(&self) -> f64 {
        match self {
            Sport::Nba => 48.0,
            Sport::Ncaab => 40.0,
            Sport::Nfl | Sport::Ncaaf | Sport::Nhl => 60.0,
            Sport::Mlb => 9.0,
        }
    }

    /// Whether games are normally played outdoors (weather applies).
    pub fn is_outdoor(&self) -> bool {
        matches!(self, Sport::Nfl | Sport::Ncaaf | Sport::Mlb)
    }

    /// Whether officiating crews materially move scoring variance.
    pub fn has_ref_volatility(&self) -> bool {
        matches!(self, Sport::Nba | Sport::Ncaab | Sport::Nfl | Sport::Ncaaf)
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sport::Nba => write!(f, "NBA"),
            Sport::Ncaab => write!(f, "NCAAB"),
            Sport::Nfl => write!(f, "NFL"),
            Sport::Ncaaf => write!(f, "NCAAF"),
            Sport::Nhl => write!(f, "NHL"),
            Sport::Mlb => write!(f, "MLB"),
        }
    }
}

/// Parse a sport key (case-insensitive), e.g. from a config table name.
impl std::str::FromStr for Sport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nba" => Ok(Sport::Nba),
            "ncaab" | "cbb" => Ok(Sport::Ncaab),
            "nfl" => Ok(Sport::Nfl),
            "ncaaf" | "cfb" => Ok(Sport::Ncaaf),
            "nhl" => Ok(Sport::Nhl),
            "mlb" => Ok(Sport::Mlb),
            _ => Err(anyhow::anyhow!("Unknown sport: {s}")),
        }
    }
}

/// Home or away team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamSide {
    Home,
    Away,
}

impl TeamSide {
    /// +1 for home, -1 for away.
    pub fn sign(&self) -> f64 {
        match self {
            TeamSide::Home => 1.0,
            TeamSide::Away => -1.0,
        }
    }
}

/// Over or under a posted total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalSide {
    Over,
    Under,
}

impl TotalSide {
    /// +1 for over, -1 for under.
    pub fn sign(&self) -> f64 {
        match self {
            TotalSide::Over => 1.0,
            TotalSide::Under => -1.0,
        }
    }
}

/// Wager type. Declaration order is the fixed evaluation order and the
/// ranking tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WagerType {
    Spread,
    Total,
    Moneyline,
}

impl WagerType {
    pub const ALL: &'static [WagerType] = &[WagerType::Spread, WagerType::Total, WagerType::Moneyline];

    /// Factor unit that feeds this wager type.
    pub fn unit(&self) -> FactorUnit {
        match self {
            WagerType::Spread => FactorUnit::PointsSpread,
            WagerType::Total => FactorUnit::PointsTotal,
            WagerType::Moneyline => FactorUnit::LogoddsWin,
        }
    }
}

impl fmt::Display for WagerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WagerType::Spread => write!(f, "Spread"),
            WagerType::Total => write!(f, "Total"),
            WagerType::Moneyline => write!(f, "Moneyline"),
        }
    }
}

/// The side of a wager a head recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    Home,
    Away,
    Over,
    Under,
}

impl From<TeamSide> for Selection {
    fn from(side: TeamSide) -> Self {
        match side {
            TeamSide::Home => Selection::Home,
            TeamSide::Away => Selection::Away,
        }
    }
}

impl From<TotalSide> for Selection {
    fn from(side: TotalSide) -> Self {
        match side {
            TotalSide::Over => Selection::Over,
            TotalSide::Under => Selection::Under,
        }
    }
}

impl Selection {
    /// +1 when the selection is home/over, -1 for away/under.
    pub fn sign(&self) -> f64 {
        match self {
            Selection::Home | Selection::Over => 1.0,
            Selection::Away | Selection::Under => -1.0,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Home => write!(f, "HOME"),
            Selection::Away => write!(f, "AWAY"),
            Selection::Over => write!(f, "OVER"),
            Selection::Under => write!(f, "UNDER"),
        }
    }
}

// ---------------------------------------------------------------------------
// Game input
// ---------------------------------------------------------------------------

/// Optional per-team statistics. Anything missing falls back to league
/// averages in the score model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamStats {
    pub pace: Option<f64>,
    pub offensive_rating: Option<f64>,
    pub defensive_rating: Option<f64>,
    pub rest_days: Option<u32>,
    #[serde(default)]
    pub back_to_back: bool,
    /// Net rating of the expected starting lineup.
    pub lineup_net_rating: Option<f64>,
    /// Travel distance to this game in miles.
    pub travel_distance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRecord {
    pub name: String,
    pub abbreviation: String,
    #[serde(default)]
    pub stats: Option<TeamStats>,
}

impl TeamRecord {
    pub fn is_back_to_back(&self) -> bool {
        self.stats.as_ref().map(|s| s.back_to_back).unwrap_or(false)
    }

    pub fn pace(&self) -> Option<f64> {
        self.stats.as_ref().and_then(|s| s.pace)
    }
}

fn default_juice() -> f64 {
    -110.0
}

/// Current market prices. Spread is quoted from the home team's
/// perspective (negative = home favored).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketLines {
    pub spread: f64,
    #[serde(default = "default_juice")]
    pub spread_home_odds: f64,
    #[serde(default = "default_juice")]
    pub spread_away_odds: f64,
    pub total: f64,
    #[serde(default = "default_juice")]
    pub over_odds: f64,
    #[serde(default = "default_juice")]
    pub under_odds: f64,
    pub moneyline_home: f64,
    pub moneyline_away: f64,
}

/// Venues designated high-altitude regardless of reported elevation.
pub const HIGH_ALTITUDE_VENUES: &[&str] = &[
    "Ball Arena",
    "Empower Field at Mile High",
    "Coors Field",
    "Delta Center",
    "Folsom Field",
];

/// Minimum elevation (feet) treated as a high-altitude venue.
pub const HIGH_ALTITUDE_FEET: f64 = 4000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub name: String,
    pub altitude_ft: Option<f64>,
    #[serde(default)]
    pub indoor: bool,
}

impl Venue {
    pub fn is_high_altitude(&self) -> bool {
        self.altitude_ft.map(|a| a >= HIGH_ALTITUDE_FEET).unwrap_or(false)
            || HIGH_ALTITUDE_VENUES
                .iter()
                .any(|v| v.eq_ignore_ascii_case(&self.name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weather {
    pub wind_mph: f64,
    /// Chance of precipitation (0.0–1.0).
    pub precipitation_chance: f64,
    pub temperature_f: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjuryStatus {
    Out,
    Doubtful,
    Questionable,
    Probable,
}

impl InjuryStatus {
    /// How unresolved this status leaves the player's availability.
    pub fn uncertainty_weight(&self) -> f64 {
        match self {
            InjuryStatus::Out => 0.0,
            InjuryStatus::Doubtful => 0.6,
            InjuryStatus::Questionable => 1.0,
            InjuryStatus::Probable => 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Injury {
    pub player: String,
    pub side: TeamSide,
    pub status: InjuryStatus,
    pub minutes_per_game: f64,
    /// Share of team production attributed to the player (0.0–1.0).
    pub impact: f64,
}

/// Trailing observed dispersion, when the caller tracks it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmpiricalVariance {
    pub sigma_spread: Option<f64>,
    pub sigma_total: Option<f64>,
}

/// Immutable snapshot of one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInput {
    pub id: String,
    pub sport: Sport,
    pub home: TeamRecord,
    pub away: TeamRecord,
    pub market: MarketLines,
    pub venue: Venue,
    #[serde(default)]
    pub weather: Option<Weather>,
    #[serde(default)]
    pub injuries: Vec<Injury>,
    #[serde(default)]
    pub empirical: Option<EmpiricalVariance>,
    /// Officiating crew volatility score (0.0–1.0).
    #[serde(default)]
    pub ref_volatility: Option<f64>,
    /// Combined bullpen volatility score (0.0–1.0), baseball only.
    #[serde(default)]
    pub bullpen_volatility: Option<f64>,
}

impl fmt::Display for GameInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} @ {} (spread {:+.1} | total {:.1} | ML {:+.0}/{:+.0})",
            self.sport,
            self.away.abbreviation,
            self.home.abbreviation,
            self.market.spread,
            self.market.total,
            self.market.moneyline_away,
            self.market.moneyline_home,
        )
    }
}

impl GameInput {
    pub fn team(&self, side: TeamSide) -> &TeamRecord {
        match side {
            TeamSide::Home => &self.home,
            TeamSide::Away => &self.away,
        }
    }

    pub fn is_high_altitude(&self) -> bool {
        self.venue.is_high_altitude()
    }

    /// Weather only matters for open-air venues in outdoor sports.
    pub fn is_outdoor(&self) -> bool {
        self.sport.is_outdoor() && !self.venue.indoor
    }

    pub fn either_back_to_back(&self) -> bool {
        self.home.is_back_to_back() || self.away.is_back_to_back()
    }

    /// Availability uncertainty from non-final injury statuses, capped at 1.0.
    pub fn injury_uncertainty(&self) -> f64 {
        self.injuries
            .iter()
            .map(|i| i.status.uncertainty_weight() * i.impact.clamp(0.0, 1.0))
            .sum::<f64>()
            .min(1.0)
    }

    /// Helper to build a test game with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        GameInput {
            id: "nba-2026-10-21-bos-lal".to_string(),
            sport: Sport::Nba,
            home: TeamRecord {
                name: "Los Angeles Lakers".to_string(),
                abbreviation: "LAL".to_string(),
                stats: Some(TeamStats {
                    pace: Some(100.0),
                    offensive_rating: Some(114.0),
                    defensive_rating: Some(111.0),
                    rest_days: Some(1),
                    ..Default::default()
                }),
            },
            away: TeamRecord {
                name: "Boston Celtics".to_string(),
                abbreviation: "BOS".to_string(),
                stats: Some(TeamStats {
                    pace: Some(98.0),
                    offensive_rating: Some(112.0),
                    defensive_rating: Some(109.0),
                    rest_days: Some(1),
                    ..Default::default()
                }),
            },
            market: MarketLines {
                spread: -3.5,
                spread_home_odds: -110.0,
                spread_away_odds: -110.0,
                total: 224.5,
                over_odds: -110.0,
                under_odds: -110.0,
                moneyline_home: -160.0,
                moneyline_away: 135.0,
            },
            venue: Venue {
                name: "Crypto.com Arena".to_string(),
                altitude_ft: Some(300.0),
                indoor: true,
            },
            weather: None,
            injuries: Vec::new(),
            empirical: None,
            ref_volatility: None,
            bullpen_volatility: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Score prediction
// ---------------------------------------------------------------------------

/// One named contextual adjustment, in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub name: String,
    pub points: f64,
}

/// Explainability breakdown for one side of a score prediction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SideAdjustments {
    pub base_points: f64,
    pub items: Vec<Adjustment>,
    pub total: f64,
}

impl SideAdjustments {
    pub fn new(base_points: f64) -> Self {
        Self {
            base_points,
            ..Default::default()
        }
    }

    /// Record an adjustment. Zero-valued adjustments are skipped.
    pub fn push(&mut self, name: &str, points: f64) {
        if points != 0.0 {
            self.items.push(Adjustment {
                name: name.to_string(),
                points,
            });
            self.total += points;
        }
    }

    pub fn get(&self, name: &str) -> f64 {
        self.items
            .iter()
            .filter(|a| a.name == name)
            .map(|a| a.points)
            .sum()
    }

    pub fn points(&self) -> f64 {
        self.base_points + self.total
    }
}

/// Pre-market expected score for one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorePrediction {
    pub home_score: f64,
    pub away_score: f64,
    /// Home minus away.
    pub true_spread: f64,
    pub true_total: f64,
    /// Probability that the home team wins, `phi(true_spread / sigma_spread)`
    /// with `true_spread` as the home margin. Written with the home line
    /// (`-true_spread`) this is `phi(-line / sigma_spread)`.
    pub win_prob_true: f64,
    pub sigma_spread: f64,
    pub sigma_total: f64,
    pub pace: f64,
    pub home_adjustments: SideAdjustments,
    pub away_adjustments: SideAdjustments,
}

impl fmt::Display for ScorePrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "home {:.1} – away {:.1} | margin {:+.1} (σ {:.1}) | total {:.1} (σ {:.1}) | P(home)={:.1}%",
            self.home_score,
            self.away_score,
            self.true_spread,
            self.sigma_spread,
            self.true_total,
            self.sigma_total,
            self.win_prob_true * 100.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Sharp factors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorUnit {
    PointsSpread,
    PointsTotal,
    LogoddsWin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorCategory {
    /// Non-price reasoning: matchups, rest, injuries, ratings.
    Structural,
    /// Price-derived signals: line movement, consensus, steam.
    Market,
}

/// A factor's contribution, tagged by the wager direction it pushes.
/// Magnitudes are pre-clipped and reliability-weighted upstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum FactorSignal {
    #[serde(rename = "points_spread")]
    Spread { toward: TeamSide, points: f64 },
    #[serde(rename = "points_total")]
    Total { toward: TotalSide, points: f64 },
    #[serde(rename = "logodds_win")]
    Moneyline { toward: TeamSide, log_odds: f64 },
}

/// One weighted signal produced by the factor generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharpFactor {
    pub name: String,
    pub category: FactorCategory,
    pub signal: FactorSignal,
}

impl SharpFactor {
    pub fn unit(&self) -> FactorUnit {
        match self.signal {
            FactorSignal::Spread { .. } => FactorUnit::PointsSpread,
            FactorSignal::Total { .. } => FactorUnit::PointsTotal,
            FactorSignal::Moneyline { .. } => FactorUnit::LogoddsWin,
        }
    }

    /// Contribution signed so that positive means home (spread/moneyline)
    /// or over (total).
    pub fn signed_contribution(&self) -> f64 {
        match self.signal {
            FactorSignal::Spread { toward, points } => toward.sign() * points,
            FactorSignal::Total { toward, points } => toward.sign() * points,
            FactorSignal::Moneyline { toward, log_odds } => toward.sign() * log_odds,
        }
    }

    pub fn spread(name: &str, category: FactorCategory, toward: TeamSide, points: f64) -> Self {
        Self {
            name: name.to_string(),
            category,
            signal: FactorSignal::Spread { toward, points },
        }
    }

    pub fn total(name: &str, category: FactorCategory, toward: TotalSide, points: f64) -> Self {
        Self {
            name: name.to_string(),
            category,
            signal: FactorSignal::Total { toward, points },
        }
    }

    pub fn moneyline(name: &str, category: FactorCategory, toward: TeamSide, log_odds: f64) -> Self {
        Self {
            name: name.to_string(),
            category,
            signal: FactorSignal::Moneyline { toward, log_odds },
        }
    }
}

impl fmt::Display for SharpFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (what, value) = match self.signal {
            FactorSignal::Spread { toward, points } => (format!("{toward:?} spread"), points),
            FactorSignal::Total { toward, points } => (format!("{toward:?} total"), points),
            FactorSignal::Moneyline { toward, log_odds } => (format!("{toward:?} ML"), log_odds),
        };
        write!(f, "{} [{:?}] {} {:+.2}", self.name, self.category, what, value)
    }
}

// ---------------------------------------------------------------------------
// League parameters
// ---------------------------------------------------------------------------

/// Per-league betting thresholds. Read-only during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueParameters {
    /// Minimum |deviation| in points to bet a spread.
    pub min_deviation_spread: f64,
    /// Minimum |deviation| in points to bet a total.
    pub min_deviation_total: f64,
    pub min_ev_spread: f64,
    pub min_ev_total: f64,
    pub min_ev_moneyline_favorite: f64,
    pub min_ev_moneyline_underdog: f64,
    /// Most negative moneyline accepted when laying a favorite.
    pub max_favorite_price: f64,
    /// Most negative price accepted on a spread or total.
    pub max_juice: f64,
}

impl Default for LeagueParameters {
    fn default() -> Self {
        Self::defaults_for(Sport::Nba)
    }
}

impl LeagueParameters {
    /// Built-in thresholds per sport (overridden by config.toml).
    pub fn defaults_for(sport: Sport) -> Self {
        let (min_deviation_spread, min_deviation_total) = match sport {
            Sport::Nba | Sport::Ncaab => (1.5, 2.0),
            Sport::Nfl => (1.0, 1.5),
            Sport::Ncaaf => (2.0, 2.5),
            Sport::Nhl => (0.3, 0.4),
            Sport::Mlb => (0.4, 0.5),
        };
        Self {
            min_deviation_spread,
            min_deviation_total,
            min_ev_spread: 0.02,
            min_ev_total: 0.02,
            min_ev_moneyline_favorite: 0.03,
            min_ev_moneyline_underdog: 0.05,
            max_favorite_price: -250.0,
            max_juice: -130.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Pick record
// ---------------------------------------------------------------------------

/// The persisted artifact for a selected head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickRecord {
    pub id: Uuid,
    pub game_id: String,
    pub created_at: DateTime<Utc>,
    pub sport: Sport,
    pub wager_type: WagerType,
    pub selection: Selection,
    /// Human-readable selection, e.g. "LAL -3.5" or "Over 224.5".
    pub selection_text: String,
    pub odds: f64,
    pub units: Decimal,
    pub stake: Decimal,
    /// Model probability of the selection winning.
    pub confidence: f64,
    /// Expected value as a percentage of stake (display only).
    pub ev_pct: f64,
    pub reasoning: Vec<String>,
    #[serde(default)]
    pub confluence: Option<ConfluenceResult>,
}

impl fmt::Display for PickRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({:+.0}) | {}u ${} | P={:.1}% EV={:+.2}%",
            self.wager_type,
            self.selection_text,
            self.odds,
            self.units,
            self.stake,
            self.confidence * 100.0,
            self.ev_pct,
        )?;
        if let Some(c) = &self.confluence {
            write!(f, " | {}", c.tier)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain errors: fatal to a single computation, never to the process.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Probability outside (0, 1): {0}")]
    ProbabilityOutOfRange(f64),

    #[error("American odds of zero are undefined")]
    ZeroOdds,

    #[error("Invalid American odds: {0}")]
    InvalidOdds(f64),

    #[error("Sigma must be positive and finite: {0}")]
    InvalidSigma(f64),

    #[error("Invalid input ({field}): {message}")]
    InvalidInput { field: String, message: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
