//! Expected value and slippage robustness.
//!
//! EV is a fraction of stake throughout; callers multiply by 100 only
//! for display.

use serde::{Deserialize, Serialize};

use super::{american_to_decimal, check_probability, validate_odds};
use crate::types::{EngineError, EngineResult};

/// Default adverse price move a pick must survive.
pub const DEFAULT_SLIPPAGE_CENTS: f64 = 3.0;

/// American-odds points per cent of line movement.
const ODDS_POINTS_PER_CENT: f64 = 1.0;

/// Expected profit of a wager: `p * decimal * stake - stake`.
pub fn calculate_ev(probability: f64, american_odds: f64, stake: f64) -> EngineResult<f64> {
    let p = check_probability(probability)?;
    if !stake.is_finite() || stake < 0.0 {
        return Err(EngineError::InvalidInput {
            field: "stake".into(),
            message: format!("must be a non-negative amount, got {stake}"),
        });
    }
    let decimal = american_to_decimal(american_odds)?;
    Ok(p * decimal * stake - stake)
}

/// Move an American price by `points` in the bettor's favor (negative
/// values move it against the bettor).
///
/// The scale is continuous across the gap between -100 and +100: moving
/// +102 three points against the bettor lands on -101.
pub fn shift_american(odds: f64, points: f64) -> EngineResult<f64> {
    let odds = validate_odds(odds)?;
    if !points.is_finite() {
        return Err(EngineError::InvalidOdds(odds));
    }
    // Map onto a line where even money is 0 and higher is a better payout.
    let linear = if odds > 0.0 { odds - 100.0 } else { odds + 100.0 };
    let shifted = linear + points;
    Ok(if shifted >= 0.0 {
        shifted + 100.0
    } else {
        shifted - 100.0
    })
}

/// EV at the quoted price and at prices moved either way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlippageResult {
    pub ev_best: f64,
    pub ev_current: f64,
    pub ev_worst: f64,
    pub worst_odds: f64,
    /// Still profitable after the adverse move.
    pub passes: bool,
}

/// Recompute EV with the price moved `slippage_cents` for and against the
/// bettor. A pick passes only if it stays +EV after the adverse move.
pub fn test_slippage(
    probability: f64,
    american_odds: f64,
    slippage_cents: f64,
) -> EngineResult<SlippageResult> {
    let points = slippage_cents.abs() * ODDS_POINTS_PER_CENT;
    let best_odds = shift_american(american_odds, points)?;
    let worst_odds = shift_american(american_odds, -points)?;

    let ev_current = calculate_ev(probability, american_odds, 1.0)?;
    let ev_best = calculate_ev(probability, best_odds, 1.0)?;
    let ev_worst = calculate_ev(probability, worst_odds, 1.0)?;

    Ok(SlippageResult {
        ev_best,
        ev_current,
        ev_worst,
        worst_odds,
        passes: ev_worst > 0.0,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::american_to_prob;

    #[test]
    fn test_fair_bet_breaks_even() {
        for odds in [-400.0, -150.0, -110.0, 100.0, 120.0, 250.0, 800.0] {
            let p = american_to_prob(odds).unwrap();
            let ev = calculate_ev(p, odds, 1.0).unwrap();
            assert!(ev.abs() < 1e-12, "odds={odds} ev={ev}");
        }
    }

    #[test]
    fn test_ev_scales_with_stake() {
        let one = calculate_ev(0.6, -110.0, 1.0).unwrap();
        let hundred = calculate_ev(0.6, -110.0, 100.0).unwrap();
        assert!((hundred - one * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_ev_rejects_bad_inputs() {
        assert!(calculate_ev(1.0, -110.0, 1.0).is_err());
        assert!(calculate_ev(0.5, 0.0, 1.0).is_err());
        assert!(calculate_ev(0.5, -110.0, -1.0).is_err());
    }

    #[test]
    fn test_spread_scenario_ev() {
        // phi(4 / 12.5) at -110
        let ev = calculate_ev(0.625_515_8, -110.0, 1.0).unwrap();
        assert!((ev - 0.1942).abs() < 1e-3, "ev={ev}");
    }

    #[test]
    fn test_shift_american_within_side() {
        assert_eq!(shift_american(-110.0, -3.0).unwrap(), -113.0);
        assert_eq!(shift_american(-110.0, 3.0).unwrap(), -107.0);
        assert_eq!(shift_american(150.0, -3.0).unwrap(), 147.0);
        assert_eq!(shift_american(150.0, 3.0).unwrap(), 153.0);
    }

    #[test]
    fn test_shift_american_crosses_even_money() {
        assert_eq!(shift_american(102.0, -3.0).unwrap(), -101.0);
        assert_eq!(shift_american(-101.0, 3.0).unwrap(), 102.0);
        assert_eq!(shift_american(-100.0, 0.0).unwrap(), 100.0);
    }

    #[test]
    fn test_slippage_monotonic_favorites_and_underdogs() {
        for (p, odds) in [(0.60, -110.0), (0.82, -400.0), (0.45, 150.0), (0.51, 101.0), (0.5, -101.0)] {
            let s = test_slippage(p, odds, DEFAULT_SLIPPAGE_CENTS).unwrap();
            assert!(s.ev_worst <= s.ev_current, "{p} {odds}: {s:?}");
            assert!(s.ev_current <= s.ev_best, "{p} {odds}: {s:?}");
        }
    }

    #[test]
    fn test_slippage_gate() {
        // Comfortable edge survives three cents.
        let strong = test_slippage(0.6255, -110.0, 3.0).unwrap();
        assert!(strong.passes);
        assert_eq!(strong.worst_odds, -113.0);

        // Barely +EV at -110 (breakeven 52.38%) fails at -113 (53.05%).
        let thin = test_slippage(0.527, -110.0, 3.0).unwrap();
        assert!(thin.ev_current > 0.0);
        assert!(!thin.passes);
    }

    #[test]
    fn test_gap_odds_rejected_before_slippage() {
        assert_eq!(test_slippage(0.7, 50.0, 3.0), Err(EngineError::InvalidOdds(50.0)));
        assert_eq!(shift_american(-50.0, 3.0), Err(EngineError::InvalidOdds(-50.0)));
        assert_eq!(calculate_ev(0.7, -50.0, 1.0), Err(EngineError::InvalidOdds(-50.0)));
    }

    #[test]
    fn test_zero_slippage_collapses() {
        let s = test_slippage(0.55, -110.0, 0.0).unwrap();
        assert_eq!(s.ev_best, s.ev_current);
        assert_eq!(s.ev_worst, s.ev_current);
    }
}
