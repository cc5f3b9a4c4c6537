//! Confluence/tier scoring.
//!
//! Grades an already-selected pick for display: four independent signals
//! bucketed into points and summed to 0–100, then mapped to a rarity tier.
//! Nothing here feeds back into the heads.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::heads::PredictionHead;
use crate::types::SharpFactor;

const EDGE_MAX_POINTS: f64 = 35.0;
const SPECIALIZATION_MAX_POINTS: f64 = 20.0;
const STREAK_MAX_POINTS: f64 = 10.0;
const ALIGNMENT_MAX_POINTS: f64 = 35.0;

/// Edge score scale (0–10).
const EDGE_SCORE_MAX: f64 = 10.0;
/// EV fraction at which the edge score saturates.
const EDGE_SCORE_SATURATION_EV: f64 = 0.20;

const SPECIALIZATION_FLOOR: f64 = 0.45;
const SPECIALIZATION_CEILING: f64 = 0.60;
/// Graded picks required before specialization counts.
pub const MIN_SPECIALIZATION_SAMPLE: u32 = 10;

const STREAK_CAP: u32 = 5;

const ALIGNMENT_FLOOR_PCT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Common,
    Uncommon,
    Rare,
    Elite,
    Legendary,
}

impl Tier {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Tier::Legendary
        } else if score >= 70.0 {
            Tier::Elite
        } else if score >= 55.0 {
            Tier::Rare
        } else if score >= 40.0 {
            Tier::Uncommon
        } else {
            Tier::Common
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Common => "Common",
            Tier::Uncommon => "Uncommon",
            Tier::Rare => "Rare",
            Tier::Elite => "Elite",
            Tier::Legendary => "Legendary",
        };
        write!(f, "{name}")
    }
}

/// Signals feeding the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceInput {
    /// 0–10, see [`edge_score_from_ev`].
    pub edge_score: f64,
    /// Historical win rate (fraction) for this sport + wager type.
    pub specialization_win_rate: Option<f64>,
    /// Number of graded picks behind the win rate.
    pub specialization_sample: u32,
    /// Current consecutive wins.
    pub streak: u32,
    /// Share of opinionated factors agreeing with the pick, in percent.
    pub alignment_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceBreakdown {
    pub edge_strength: f64,
    pub specialization: f64,
    pub streak: f64,
    pub alignment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceResult {
    pub tier: Tier,
    /// 0–100.
    pub score: f64,
    pub breakdown: ConfluenceBreakdown,
}

/// Position of `value` on the `[lo, hi]` ramp, clamped to [0, 1].
fn ramp(value: f64, lo: f64, hi: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
}

pub fn calculate_confluence_score(input: &ConfluenceInput) -> ConfluenceResult {
    let edge_strength = EDGE_MAX_POINTS * ramp(input.edge_score, 0.0, EDGE_SCORE_MAX);

    let specialization = match input.specialization_win_rate {
        Some(rate) if input.specialization_sample >= MIN_SPECIALIZATION_SAMPLE => {
            SPECIALIZATION_MAX_POINTS * ramp(rate, SPECIALIZATION_FLOOR, SPECIALIZATION_CEILING)
        }
        _ => 0.0,
    };

    let streak = STREAK_MAX_POINTS * (input.streak.min(STREAK_CAP) as f64 / STREAK_CAP as f64);

    let alignment = ALIGNMENT_MAX_POINTS * ramp(input.alignment_pct, ALIGNMENT_FLOOR_PCT, 100.0);

    let score = (edge_strength + specialization + streak + alignment).clamp(0.0, 100.0);

    ConfluenceResult {
        tier: Tier::from_score(score),
        score,
        breakdown: ConfluenceBreakdown {
            edge_strength,
            specialization,
            streak,
            alignment,
        },
    }
}

/// Map an EV fraction onto the 0–10 edge score. Non-positive EV scores 0.
pub fn edge_score_from_ev(ev: f64) -> f64 {
    EDGE_SCORE_MAX * ramp(ev, 0.0, EDGE_SCORE_SATURATION_EV)
}

/// Percentage of factors for the head's wager type that point the same
/// way as the selection. Factors contributing exactly 0 have no opinion
/// and are left out; with no opinionated factors the result is 0.
pub fn factor_alignment(factors: &[SharpFactor], head: &PredictionHead) -> f64 {
    let unit = head.wager_type.unit();
    let direction = head.selection.sign();

    let (agree, opinionated) = factors
        .iter()
        .filter(|f| f.unit() == unit)
        .map(SharpFactor::signed_contribution)
        .filter(|c| *c != 0.0)
        .fold((0usize, 0usize), |(agree, n), c| {
            (agree + usize::from(c * direction > 0.0), n + 1)
        });

    if opinionated == 0 {
        0.0
    } else {
        agree as f64 / opinionated as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::heads::{calculate_heads, HeadsConfig};
    use crate::types::{FactorCategory, GameInput, LeagueParameters, TeamSide};

    fn make_input() -> ConfluenceInput {
        ConfluenceInput {
            edge_score: 5.0,
            specialization_win_rate: Some(0.525),
            specialization_sample: 40,
            streak: 2,
            alignment_pct: 75.0,
        }
    }

    #[test]
    fn test_breakdown_components() {
        let r = calculate_confluence_score(&make_input());
        assert!((r.breakdown.edge_strength - 17.5).abs() < 1e-9);
        assert!((r.breakdown.specialization - 10.0).abs() < 1e-9);
        assert!((r.breakdown.streak - 4.0).abs() < 1e-9);
        assert!((r.breakdown.alignment - 17.5).abs() < 1e-9);
        assert!((r.score - 49.0).abs() < 1e-9);
        assert_eq!(r.tier, Tier::Uncommon);
    }

    #[test]
    fn test_maximum_is_legendary() {
        let r = calculate_confluence_score(&ConfluenceInput {
            edge_score: 12.0,
            specialization_win_rate: Some(0.70),
            specialization_sample: 100,
            streak: 9,
            alignment_pct: 100.0,
        });
        assert_eq!(r.score, 100.0);
        assert_eq!(r.tier, Tier::Legendary);
    }

    #[test]
    fn test_small_sample_ignored() {
        let input = ConfluenceInput { specialization_sample: 9, ..make_input() };
        assert_eq!(calculate_confluence_score(&input).breakdown.specialization, 0.0);
    }

    #[test]
    fn test_alignment_at_or_below_half_scores_zero() {
        let input = ConfluenceInput { alignment_pct: 50.0, ..make_input() };
        assert_eq!(calculate_confluence_score(&input).breakdown.alignment, 0.0);
        let input = ConfluenceInput { alignment_pct: 20.0, ..make_input() };
        assert_eq!(calculate_confluence_score(&input).breakdown.alignment, 0.0);
    }

    #[test]
    fn test_tier_cutoffs() {
        assert_eq!(Tier::from_score(85.0), Tier::Legendary);
        assert_eq!(Tier::from_score(84.9), Tier::Elite);
        assert_eq!(Tier::from_score(70.0), Tier::Elite);
        assert_eq!(Tier::from_score(55.0), Tier::Rare);
        assert_eq!(Tier::from_score(40.0), Tier::Uncommon);
        assert_eq!(Tier::from_score(39.9), Tier::Common);
    }

    #[test]
    fn test_monotonic_in_each_input() {
        let base = make_input();
        let score = |i: &ConfluenceInput| calculate_confluence_score(i).score;

        let mut last = f64::MIN;
        for edge in [0.0, 2.0, 5.0, 9.0, 10.0, 14.0] {
            let s = score(&ConfluenceInput { edge_score: edge, ..base.clone() });
            assert!(s >= last);
            last = s;
        }

        let mut last = f64::MIN;
        for rate in [0.30, 0.45, 0.50, 0.55, 0.60, 0.75] {
            let s = score(&ConfluenceInput { specialization_win_rate: Some(rate), ..base.clone() });
            assert!(s >= last);
            last = s;
        }

        let mut last = f64::MIN;
        for streak in 0..8 {
            let s = score(&ConfluenceInput { streak, ..base.clone() });
            assert!(s >= last);
            last = s;
        }

        let mut last = f64::MIN;
        for pct in [0.0, 40.0, 50.0, 60.0, 90.0, 100.0] {
            let s = score(&ConfluenceInput { alignment_pct: pct, ..base.clone() });
            assert!(s >= last);
            last = s;
        }
    }

    #[test]
    fn test_edge_score_from_ev() {
        assert_eq!(edge_score_from_ev(-0.05), 0.0);
        assert!((edge_score_from_ev(0.10) - 5.0).abs() < 1e-12);
        assert_eq!(edge_score_from_ev(0.20), 10.0);
        assert_eq!(edge_score_from_ev(0.45), 10.0);
    }

    #[test]
    fn test_factor_alignment_excludes_zero_contributions() {
        let factors = vec![
            SharpFactor::spread("matchup", FactorCategory::Structural, TeamSide::Home, 3.0),
            SharpFactor::spread("rest", FactorCategory::Structural, TeamSide::Home, 1.5),
            SharpFactor::spread("travel", FactorCategory::Structural, TeamSide::Away, 0.5),
            SharpFactor::spread("flat", FactorCategory::Market, TeamSide::Away, 0.0),
            SharpFactor::moneyline("ignored", FactorCategory::Structural, TeamSide::Away, 0.3),
        ];
        let game = GameInput::sample();
        let heads = calculate_heads(
            &game.market,
            12.5,
            14.0,
            &factors,
            &LeagueParameters::default(),
            &HeadsConfig::default(),
        )
        .unwrap();
        let pct = factor_alignment(&factors, &heads.spread);
        assert!((pct - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_factor_alignment_no_opinion() {
        let game = GameInput::sample();
        let heads = calculate_heads(
            &game.market,
            12.5,
            14.0,
            &[],
            &LeagueParameters::default(),
            &HeadsConfig::default(),
        )
        .unwrap();
        assert_eq!(factor_alignment(&[], &heads.total), 0.0);
    }
}
