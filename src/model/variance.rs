//! Variance estimator.
//!
//! Expected dispersion (σ) of the final margin and final total, from a
//! per-sport base table with multiplicative contextual adjustments.

use serde::{Deserialize, Serialize};

use crate::types::{GameInput, Sport, Weather};

/// Weight given to trailing empirical sigma when supplied.
const EMPIRICAL_BLEND: f64 = 0.30;

/// NBA possessions beyond which variance moves ±5% / ±10%. Other leagues
/// scale these by their average pace relative to the NBA.
const PACE_MILD: f64 = 3.0;
const PACE_STRONG: f64 = 6.0;

const WIND_MPH_THRESHOLD: f64 = 15.0;
const PRECIPITATION_THRESHOLD: f64 = 0.5;

/// Base σ for (margin, total) per sport.
fn base_sigma(sport: Sport) -> (f64, f64) {
    match sport {
        Sport::Nba => (12.5, 14.0),
        Sport::Ncaab => (11.0, 13.0),
        Sport::Nfl => (13.5, 13.0),
        Sport::Ncaaf => (15.5, 15.0),
        Sport::Nhl => (2.3, 2.2),
        Sport::Mlb => (4.3, 4.4),
    }
}

/// Everything the estimator looks at, built from a `GameInput`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceContext {
    pub sport: Sport,
    /// Predicted possessions, compared against the league average.
    pub pace: Option<f64>,
    pub high_altitude: bool,
    pub back_to_back: bool,
    /// 0.0–1.0; values above 1.0 are capped.
    pub injury_uncertainty: f64,
    pub outdoor: bool,
    pub weather: Option<Weather>,
    pub ref_volatility: Option<f64>,
    pub bullpen_volatility: Option<f64>,
    pub empirical_sigma_spread: Option<f64>,
    pub empirical_sigma_total: Option<f64>,
}

impl VarianceContext {
    /// Neutral context: base table only.
    pub fn new(sport: Sport) -> Self {
        Self {
            sport,
            pace: None,
            high_altitude: false,
            back_to_back: false,
            injury_uncertainty: 0.0,
            outdoor: sport.is_outdoor(),
            weather: None,
            ref_volatility: None,
            bullpen_volatility: None,
            empirical_sigma_spread: None,
            empirical_sigma_total: None,
        }
    }

    pub fn from_game(game: &GameInput, predicted_pace: Option<f64>) -> Self {
        let empirical = game.empirical.clone().unwrap_or_default();
        Self {
            sport: game.sport,
            pace: predicted_pace,
            high_altitude: game.is_high_altitude(),
            back_to_back: game.either_back_to_back(),
            injury_uncertainty: game.injury_uncertainty(),
            outdoor: game.is_outdoor(),
            weather: game.weather.clone(),
            ref_volatility: game.ref_volatility,
            bullpen_volatility: game.bullpen_volatility,
            empirical_sigma_spread: empirical.sigma_spread,
            empirical_sigma_total: empirical.sigma_total,
        }
    }
}

fn unit_score(v: Option<f64>) -> f64 {
    v.filter(|x| x.is_finite()).unwrap_or(0.0).clamp(0.0, 1.0)
}

fn pace_multiplier(ctx: &VarianceContext) -> f64 {
    let Some(pace) = ctx.pace.filter(|p| p.is_finite()) else {
        return 1.0;
    };
    let avg = ctx.sport.league_average_pace();
    let scale = avg / Sport::Nba.league_average_pace();
    let (mild, strong) = (PACE_MILD * scale, PACE_STRONG * scale);
    let delta = pace - avg;
    if delta > strong {
        1.10
    } else if delta > mild {
        1.05
    } else if delta < -strong {
        0.90
    } else if delta < -mild {
        0.95
    } else {
        1.0
    }
}

/// (margin, total) multipliers for outdoor weather.
fn weather_multipliers(ctx: &VarianceContext) -> (f64, f64) {
    let Some(weather) = ctx.weather.as_ref().filter(|_| ctx.outdoor) else {
        return (1.0, 1.0);
    };
    let mut spread = 1.0;
    let mut total = 1.0;
    if weather.wind_mph > WIND_MPH_THRESHOLD {
        spread *= 1.03;
        total *= 1.05;
    }
    if weather.precipitation_chance >= PRECIPITATION_THRESHOLD {
        spread *= 1.02;
        total *= 1.04;
    }
    (spread, total)
}

fn shared_multiplier(ctx: &VarianceContext) -> f64 {
    let mut m = pace_multiplier(ctx);
    if ctx.back_to_back {
        m *= 1.03;
    }
    m *= 1.0 + 0.15 * unit_score(Some(ctx.injury_uncertainty));
    if ctx.sport.has_ref_volatility() {
        m *= 1.0 + 0.05 * unit_score(ctx.ref_volatility);
    }
    if ctx.sport == Sport::Mlb {
        m *= 1.0 + 0.08 * unit_score(ctx.bullpen_volatility);
    }
    m
}

fn blend_empirical(estimate: f64, empirical: Option<f64>) -> f64 {
    match empirical.filter(|e| e.is_finite() && *e > 0.0) {
        Some(e) => (1.0 - EMPIRICAL_BLEND) * estimate + EMPIRICAL_BLEND * e,
        None => estimate,
    }
}

/// σ of the final margin (home − away). Always > 0.
pub fn estimate_sigma_spread(ctx: &VarianceContext) -> f64 {
    let (base, _) = base_sigma(ctx.sport);
    let mut sigma = base * shared_multiplier(ctx);
    if ctx.high_altitude {
        sigma *= 1.05;
    }
    sigma *= weather_multipliers(ctx).0;
    blend_empirical(sigma, ctx.empirical_sigma_spread)
}

/// σ of the final combined score. Always > 0.
pub fn estimate_sigma_total(ctx: &VarianceContext) -> f64 {
    let (_, base) = base_sigma(ctx.sport);
    let mut sigma = base * shared_multiplier(ctx);
    if ctx.high_altitude {
        sigma *= 1.08;
    }
    sigma *= weather_multipliers(ctx).1;
    blend_empirical(sigma, ctx.empirical_sigma_total)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_base_table_nba() {
        let ctx = VarianceContext::new(Sport::Nba);
        assert!(close(estimate_sigma_spread(&ctx), 12.5));
        assert!(close(estimate_sigma_total(&ctx), 14.0));
    }

    #[test]
    fn test_pace_thresholds() {
        let mut ctx = VarianceContext::new(Sport::Nba);
        ctx.pace = Some(99.0 + 4.0);
        assert!(close(estimate_sigma_total(&ctx), 14.0 * 1.05));
        ctx.pace = Some(99.0 + 7.0);
        assert!(close(estimate_sigma_total(&ctx), 14.0 * 1.10));
        ctx.pace = Some(99.0 - 7.0);
        assert!(close(estimate_sigma_spread(&ctx), 12.5 * 0.90));
        ctx.pace = Some(99.0 + 1.0);
        assert!(close(estimate_sigma_spread(&ctx), 12.5));
    }

    #[test]
    fn test_pace_thresholds_scale_with_league() {
        let mut nhl = VarianceContext::new(Sport::Nhl);
        nhl.pace = Some(3.75);
        assert!(close(estimate_sigma_total(&nhl), 2.2 * 1.10));
        nhl.pace = Some(2.5 + 0.1);
        assert!(close(estimate_sigma_total(&nhl), 2.2 * 1.05));
        nhl.pace = Some(2.5 + 0.05);
        assert!(close(estimate_sigma_total(&nhl), 2.2));

        let mut mlb = VarianceContext::new(Sport::Mlb);
        mlb.pace = Some(3.7 - 0.3);
        assert!(close(estimate_sigma_spread(&mlb), 4.3 * 0.90));

        // 4 extra plays clears the NFL's strong threshold, not the NBA's.
        let mut nfl = VarianceContext::new(Sport::Nfl);
        nfl.pace = Some(18.6 + 4.0);
        assert!(close(estimate_sigma_total(&nfl), 13.0 * 1.10));
    }

    #[test]
    fn test_altitude_and_back_to_back() {
        let mut ctx = VarianceContext::new(Sport::Nba);
        ctx.high_altitude = true;
        ctx.back_to_back = true;
        assert!(close(estimate_sigma_spread(&ctx), 12.5 * 1.03 * 1.05));
        assert!(close(estimate_sigma_total(&ctx), 14.0 * 1.03 * 1.08));
    }

    #[test]
    fn test_injury_uncertainty_capped() {
        let mut ctx = VarianceContext::new(Sport::Nba);
        ctx.injury_uncertainty = 3.0;
        assert!(close(estimate_sigma_spread(&ctx), 12.5 * 1.15));
        ctx.injury_uncertainty = 0.5;
        assert!(close(estimate_sigma_spread(&ctx), 12.5 * 1.075));
    }

    #[test]
    fn test_weather_only_outdoors() {
        let storm = Weather { wind_mph: 22.0, precipitation_chance: 0.8, temperature_f: Some(35.0) };

        let mut nfl = VarianceContext::new(Sport::Nfl);
        nfl.weather = Some(storm.clone());
        assert!(close(estimate_sigma_total(&nfl), 13.0 * 1.05 * 1.04));

        nfl.outdoor = false; // dome
        assert!(close(estimate_sigma_total(&nfl), 13.0));

        let mut nba = VarianceContext::new(Sport::Nba);
        nba.weather = Some(storm);
        assert!(close(estimate_sigma_total(&nba), 14.0));
    }

    #[test]
    fn test_bullpen_volatility_mlb_only() {
        let mut mlb = VarianceContext::new(Sport::Mlb);
        mlb.bullpen_volatility = Some(1.0);
        assert!(close(estimate_sigma_total(&mlb), 4.4 * 1.08));

        let mut nhl = VarianceContext::new(Sport::Nhl);
        nhl.bullpen_volatility = Some(1.0);
        assert!(close(estimate_sigma_total(&nhl), 2.2));
    }

    #[test]
    fn test_empirical_blend() {
        let mut ctx = VarianceContext::new(Sport::Nba);
        ctx.empirical_sigma_spread = Some(10.0);
        assert!(close(estimate_sigma_spread(&ctx), 0.7 * 12.5 + 0.3 * 10.0));
        ctx.empirical_sigma_spread = Some(-4.0);
        assert!(close(estimate_sigma_spread(&ctx), 12.5));
    }

    #[test]
    fn test_always_positive() {
        for sport in Sport::ALL {
            let mut ctx = VarianceContext::new(*sport);
            ctx.pace = Some(0.0);
            ctx.injury_uncertainty = -5.0;
            ctx.ref_volatility = Some(-1.0);
            assert!(estimate_sigma_spread(&ctx) > 0.0);
            assert!(estimate_sigma_total(&ctx) > 0.0);
        }
    }

    #[test]
    fn test_context_from_game() {
        let mut game = crate::types::GameInput::sample();
        game.venue.name = "Ball Arena".into();
        game.away.stats.as_mut().unwrap().back_to_back = true;
        let ctx = VarianceContext::from_game(&game, Some(101.0));
        assert!(ctx.high_altitude);
        assert!(ctx.back_to_back);
        assert!(!ctx.outdoor);
        assert_eq!(ctx.pace, Some(101.0));
    }
}
