//! Score prediction model.
//!
//! Possession-based expected score for both teams plus contextual
//! adjustments. Adjustment constants are calibrated in NBA points and
//! scaled by each league's pace relative to the NBA.

use tracing::debug;

use super::variance::{estimate_sigma_spread, estimate_sigma_total, VarianceContext};
use crate::math::{check_probability, phi};
use crate::types::{
    EngineError, EngineResult, GameInput, InjuryStatus, ScorePrediction, SideAdjustments, Sport,
    TeamSide,
};

const HOME_PACE_WEIGHT: f64 = 0.52;
const BACK_TO_BACK_PACE: f64 = -2.0;
const ALTITUDE_PACE: f64 = 1.5;

/// League-average offensive/defensive rating fallback.
pub const DEFAULT_RATING: f64 = 110.0;

const HOME_COURT: f64 = 2.5;
const BACK_TO_BACK_POINTS: f64 = -2.0;
const RESTED_POINTS: f64 = 0.5;
const RESTED_DAYS: u32 = 3;
const TRAVEL_MILES: f64 = 1500.0;
const TRAVEL_POINTS: f64 = -1.0;
const ALTITUDE_HOME_POINTS: f64 = 1.5;
const ALTITUDE_AWAY_POINTS: f64 = -1.0;
const LINEUP_NET_RATING_SCALE: f64 = 0.1;
const INJURY_SCALE: f64 = 3.0;
/// Share of regulation a player must average to count as a major contributor.
const MAJOR_CONTRIBUTOR_SHARE: f64 = 0.4;

fn adjustment_scale(sport: Sport) -> f64 {
    sport.league_average_pace() / Sport::Nba.league_average_pace()
}

fn positive_stat(value: Option<f64>, field: &str, fallback: f64) -> EngineResult<f64> {
    match value {
        None => Ok(fallback),
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(EngineError::InvalidInput {
            field: field.to_string(),
            message: format!("must be positive and finite, got {v}"),
        }),
    }
}

/// Pace blend with the fixed context adjustments.
pub fn predict_pace(game: &GameInput) -> EngineResult<f64> {
    let avg = game.sport.league_average_pace();
    let home = positive_stat(game.home.pace(), "home.pace", avg)?;
    let away = positive_stat(game.away.pace(), "away.pace", avg)?;

    let scale = adjustment_scale(game.sport);
    let mut pace = HOME_PACE_WEIGHT * home + (1.0 - HOME_PACE_WEIGHT) * away;
    if game.either_back_to_back() {
        pace += BACK_TO_BACK_PACE * scale;
    }
    if game.is_high_altitude() {
        pace += ALTITUDE_PACE * scale;
    }
    Ok(pace.max(f64::EPSILON))
}

fn ratings(game: &GameInput, side: TeamSide) -> EngineResult<(f64, f64)> {
    let label = match side {
        TeamSide::Home => "home",
        TeamSide::Away => "away",
    };
    let stats = game.team(side).stats.as_ref();
    let ortg = positive_stat(
        stats.and_then(|s| s.offensive_rating),
        &format!("{label}.offensive_rating"),
        DEFAULT_RATING,
    )?;
    let drtg = positive_stat(
        stats.and_then(|s| s.defensive_rating),
        &format!("{label}.defensive_rating"),
        DEFAULT_RATING,
    )?;
    Ok((ortg, drtg))
}

/// Points lost to ruled-out major contributors (negative).
fn injury_penalty(game: &GameInput, side: TeamSide) -> f64 {
    let regulation = game.sport.regulation_minutes();
    let lost: f64 = game
        .injuries
        .iter()
        .filter(|i| i.side == side && i.status == InjuryStatus::Out)
        .filter_map(|i| {
            let share = (i.minutes_per_game / regulation).clamp(0.0, 1.0);
            (share >= MAJOR_CONTRIBUTOR_SHARE).then(|| i.impact.clamp(0.0, 1.0) * share)
        })
        .sum();
    -INJURY_SCALE * lost
}

fn side_adjustments(game: &GameInput, side: TeamSide, base_points: f64) -> SideAdjustments {
    let scale = adjustment_scale(game.sport);
    let team = game.team(side);
    let stats = team.stats.clone().unwrap_or_default();
    let mut adj = SideAdjustments::new(base_points);

    if side == TeamSide::Home {
        adj.push("home_court", HOME_COURT * scale);
    }

    if stats.back_to_back {
        adj.push("rest", BACK_TO_BACK_POINTS * scale);
    } else if stats.rest_days.map(|d| d >= RESTED_DAYS).unwrap_or(false) {
        adj.push("rest", RESTED_POINTS * scale);
    }

    if stats.travel_distance.map(|d| d > TRAVEL_MILES).unwrap_or(false) {
        adj.push("travel", TRAVEL_POINTS * scale);
    }

    if game.is_high_altitude() {
        let points = match side {
            TeamSide::Home => ALTITUDE_HOME_POINTS,
            TeamSide::Away => ALTITUDE_AWAY_POINTS,
        };
        adj.push("altitude", points * scale);
    }

    if let Some(net) = stats.lineup_net_rating.filter(|n| n.is_finite()) {
        adj.push("lineup", net * LINEUP_NET_RATING_SCALE * scale);
    }

    adj.push("injuries", injury_penalty(game, side) * scale);
    adj
}

/// Pre-market expected score for both teams.
pub fn predict_score(game: &GameInput) -> EngineResult<ScorePrediction> {
    let pace = predict_pace(game)?;
    let (home_ortg, home_drtg) = ratings(game, TeamSide::Home)?;
    let (away_ortg, away_drtg) = ratings(game, TeamSide::Away)?;

    let home_base = pace * (home_ortg / 100.0) * (away_drtg / 100.0);
    let away_base = pace * (away_ortg / 100.0) * (home_drtg / 100.0);

    let home_adjustments = side_adjustments(game, TeamSide::Home, home_base);
    let away_adjustments = side_adjustments(game, TeamSide::Away, away_base);

    let home_score = home_adjustments.points().max(0.0);
    let away_score = away_adjustments.points().max(0.0);
    let true_spread = home_score - away_score;
    let true_total = home_score + away_score;

    let ctx = VarianceContext::from_game(game, Some(pace));
    let sigma_spread = estimate_sigma_spread(&ctx);
    let sigma_total = estimate_sigma_total(&ctx);
    if !sigma_spread.is_finite() || sigma_spread <= 0.0 {
        return Err(EngineError::InvalidSigma(sigma_spread));
    }

    // Home wins when the margin exceeds zero; with the line quoted as
    // -margin this is phi(-line / sigma).
    let win_prob_true = check_probability(phi(true_spread / sigma_spread))?;

    debug!(
        game_id = %game.id,
        pace = format!("{:.1}", pace),
        home = format!("{:.1}", home_score),
        away = format!("{:.1}", away_score),
        win_prob = format!("{:.1}%", win_prob_true * 100.0),
        "Score predicted"
    );

    Ok(ScorePrediction {
        home_score,
        away_score,
        true_spread,
        true_total,
        win_prob_true,
        sigma_spread,
        sigma_total,
        pace,
        home_adjustments,
        away_adjustments,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Injury, TeamStats};

    fn neutral_game() -> GameInput {
        let mut game = GameInput::sample();
        game.home.stats = None;
        game.away.stats = None;
        game
    }

    #[test]
    fn test_missing_stats_fall_back_to_league_average() {
        let game = neutral_game();
        let pred = predict_score(&game).unwrap();
        let base = 99.0 * 1.1 * 1.1;
        assert!((pred.away_score - base).abs() < 1e-9);
        assert!((pred.home_score - (base + 2.5)).abs() < 1e-9);
        assert!((pred.true_spread - 2.5).abs() < 1e-9);
        assert!(pred.win_prob_true > 0.5);
    }

    #[test]
    fn test_pace_blend_weights_home() {
        let mut game = neutral_game();
        game.home.stats = Some(TeamStats { pace: Some(104.0), ..Default::default() });
        game.away.stats = Some(TeamStats { pace: Some(96.0), ..Default::default() });
        let pace = predict_pace(&game).unwrap();
        assert!((pace - (0.52 * 104.0 + 0.48 * 96.0)).abs() < 1e-9);
    }

    #[test]
    fn test_back_to_back_and_altitude_pace() {
        let mut game = neutral_game();
        game.away.stats = Some(TeamStats { back_to_back: true, ..Default::default() });
        game.venue.name = "Ball Arena".into();
        let pace = predict_pace(&game).unwrap();
        assert!((pace - (99.0 - 2.0 + 1.5)).abs() < 1e-9);
    }

    #[test]
    fn test_context_adjustments_recorded() {
        let mut game = neutral_game();
        game.venue.name = "Ball Arena".into();
        game.home.stats = Some(TeamStats { rest_days: Some(3), lineup_net_rating: Some(8.0), ..Default::default() });
        game.away.stats = Some(TeamStats {
            back_to_back: true,
            travel_distance: Some(1800.0),
            ..Default::default()
        });
        let pred = predict_score(&game).unwrap();
        let home = &pred.home_adjustments;
        let away = &pred.away_adjustments;
        assert_eq!(home.get("home_court"), 2.5);
        assert_eq!(home.get("rest"), 0.5);
        assert_eq!(home.get("altitude"), 1.5);
        assert!((home.get("lineup") - 0.8).abs() < 1e-12);
        assert_eq!(away.get("rest"), -2.0);
        assert_eq!(away.get("travel"), -1.0);
        assert_eq!(away.get("altitude"), -1.0);
        assert_eq!(away.get("home_court"), 0.0);
        assert!((pred.true_spread - (home.points() - away.points())).abs() < 1e-9);
        assert!((pred.true_total - (home.points() + away.points())).abs() < 1e-9);
    }

    #[test]
    fn test_injury_penalty_major_contributors_only() {
        let mut game = neutral_game();
        game.injuries = vec![
            Injury { player: "star".into(), side: TeamSide::Away, status: InjuryStatus::Out, minutes_per_game: 36.0, impact: 0.3 },
            Injury { player: "bench".into(), side: TeamSide::Away, status: InjuryStatus::Out, minutes_per_game: 8.0, impact: 0.3 },
            Injury { player: "gtd".into(), side: TeamSide::Away, status: InjuryStatus::Questionable, minutes_per_game: 30.0, impact: 0.2 },
        ];
        let pred = predict_score(&game).unwrap();
        let expected = -3.0 * 0.3 * (36.0 / 48.0);
        assert!((pred.away_adjustments.get("injuries") - expected).abs() < 1e-12);
        assert_eq!(pred.home_adjustments.get("injuries"), 0.0);
    }

    #[test]
    fn test_sigma_and_win_prob_consistent() {
        let game = GameInput::sample();
        let pred = predict_score(&game).unwrap();
        assert!(pred.sigma_spread > 0.0 && pred.sigma_total > 0.0);
        let expected = phi(pred.true_spread / pred.sigma_spread);
        assert!((pred.win_prob_true - expected).abs() < 1e-12);
        assert!(pred.win_prob_true > 0.0 && pred.win_prob_true < 1.0);
    }

    #[test]
    fn test_win_prob_is_home_side() {
        // Neutral stats leave home court as the only edge.
        let pred = predict_score(&neutral_game()).unwrap();
        let home_line = -pred.true_spread;
        assert!(home_line < 0.0);
        assert!((pred.win_prob_true - phi(-home_line / pred.sigma_spread)).abs() < 1e-12);
        assert!(pred.win_prob_true > 0.5);
    }

    #[test]
    fn test_adjustments_scale_with_league() {
        let mut game = neutral_game();
        game.sport = Sport::Nhl;
        let pred = predict_score(&game).unwrap();
        // Home ice is a fraction of a goal, not 2.5 goals.
        assert!(pred.home_adjustments.get("home_court") < 0.1);
        assert!(pred.true_total > 4.0 && pred.true_total < 8.0);
    }

    #[test]
    fn test_invalid_stats_rejected() {
        let mut game = neutral_game();
        game.home.stats = Some(TeamStats { offensive_rating: Some(-5.0), ..Default::default() });
        assert!(matches!(predict_score(&game), Err(EngineError::InvalidInput { .. })));
    }
}
