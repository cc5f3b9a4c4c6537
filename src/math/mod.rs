//! Odds math library.
//!
//! Pure, stateless conversions between American odds, implied
//! probabilities and decimal payouts, plus the log-odds and normal-CDF
//! helpers the prediction heads are built on. EV/slippage, edge
//! attribution and Kelly sizing live in the submodules.

pub mod edge;
pub mod ev;
pub mod kelly;

use crate::types::{EngineError, EngineResult};

pub use edge::{calculate_edge_attribution, EdgeAttribution, DEFAULT_MAX_STRUCTURAL_PCT};
pub use ev::{calculate_ev, shift_american, test_slippage, SlippageResult, DEFAULT_SLIPPAGE_CENTS};
pub use kelly::{
    calculate_kelly_stake, kelly_to_units, KellyCalculator, KellyConfig, SizedBet,
    DEFAULT_KELLY_FRACTION,
};

fn validate_odds(odds: f64) -> EngineResult<f64> {
    if !odds.is_finite() {
        return Err(EngineError::InvalidOdds(odds));
    }
    if odds == 0.0 {
        return Err(EngineError::ZeroOdds);
    }
    // American prices never sit strictly between -100 and +100.
    if odds.abs() < 100.0 {
        return Err(EngineError::InvalidOdds(odds));
    }
    Ok(odds)
}

/// Reject anything that is not strictly inside (0, 1).
pub fn check_probability(p: f64) -> EngineResult<f64> {
    if p.is_finite() && p > 0.0 && p < 1.0 {
        Ok(p)
    } else {
        Err(EngineError::ProbabilityOutOfRange(p))
    }
}

/// Implied probability of American odds (vig included).
///
/// Favorite (`odds < 0`): `|odds| / (|odds| + 100)`.
/// Underdog (`odds > 0`): `100 / (odds + 100)`.
pub fn american_to_prob(odds: f64) -> EngineResult<f64> {
    let odds = validate_odds(odds)?;
    let p = if odds < 0.0 {
        let abs = odds.abs();
        abs / (abs + 100.0)
    } else {
        100.0 / (odds + 100.0)
    };
    check_probability(p)
}

/// Decimal payout (stake included) of American odds.
pub fn american_to_decimal(odds: f64) -> EngineResult<f64> {
    let odds = validate_odds(odds)?;
    Ok(if odds < 0.0 {
        1.0 + 100.0 / odds.abs()
    } else {
        1.0 + odds / 100.0
    })
}

/// Fair American odds for a probability (display helper).
pub fn prob_to_american(p: f64) -> EngineResult<f64> {
    let p = check_probability(p)?;
    Ok(if p >= 0.5 {
        -(p / (1.0 - p)) * 100.0
    } else {
        ((1.0 - p) / p) * 100.0
    })
}

/// Remove the bookmaker margin from a two-way market.
///
/// Pairs that already sum to 1.0 or less are returned unchanged.
pub fn remove_vig(p_a: f64, p_b: f64) -> (f64, f64) {
    let sum = p_a + p_b;
    if sum <= 1.0 {
        return (p_a, p_b);
    }
    // Derive the smaller side from the larger so the pair sums to exactly 1.
    if p_a >= p_b {
        let fair_a = p_a / sum;
        (fair_a, 1.0 - fair_a)
    } else {
        let fair_b = p_b / sum;
        (1.0 - fair_b, fair_b)
    }
}

/// Log-odds of a probability.
pub fn logit(p: f64) -> EngineResult<f64> {
    let p = check_probability(p)?;
    Ok((p / (1.0 - p)).ln())
}

/// Inverse of `logit`. Fails when the result is indistinguishable from 0
/// or 1 in `f64`.
pub fn sigmoid(z: f64) -> EngineResult<f64> {
    let p = if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    };
    check_probability(p)
}

/// Error function, Abramowitz–Stegun 7.1.26 (|error| ≤ 1.5e-7).
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// Standard normal CDF.
pub fn phi(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_american_to_prob_favorite_and_underdog() {
        assert!((american_to_prob(-110.0).unwrap() - 0.523_809_5).abs() < 1e-6);
        assert!((american_to_prob(150.0).unwrap() - 0.4).abs() < 1e-12);
        assert!((american_to_prob(100.0).unwrap() - 0.5).abs() < 1e-12);
        assert!((american_to_prob(-400.0).unwrap() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_zero_odds_rejected() {
        assert_eq!(american_to_prob(0.0), Err(EngineError::ZeroOdds));
        assert_eq!(american_to_decimal(0.0), Err(EngineError::ZeroOdds));
        assert!(matches!(american_to_prob(f64::NAN), Err(EngineError::InvalidOdds(_))));
    }

    #[test]
    fn test_odds_inside_even_money_gap_rejected() {
        for odds in [-99.0, -50.0, 50.0, 99.5] {
            assert_eq!(american_to_prob(odds), Err(EngineError::InvalidOdds(odds)));
            assert_eq!(american_to_decimal(odds), Err(EngineError::InvalidOdds(odds)));
        }
        assert!((american_to_decimal(-100.0).unwrap() - 2.0).abs() < 1e-12);
        assert!((american_to_decimal(100.0).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_american_to_decimal() {
        assert!((american_to_decimal(-110.0).unwrap() - 1.909_090_9).abs() < 1e-6);
        assert!((american_to_decimal(150.0).unwrap() - 2.5).abs() < 1e-12);
        assert!((american_to_decimal(-200.0).unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_prob_to_american_inverts() {
        for odds in [-250.0, -110.0, 100.0, 135.0, 400.0] {
            let p = american_to_prob(odds).unwrap();
            let back = prob_to_american(p).unwrap();
            // +100 and -100 are the same price.
            assert!((back.abs() - odds.abs()).abs() < 1e-6, "{odds} -> {back}");
        }
    }

    #[test]
    fn test_remove_vig_normalizes_overround() {
        let (a, b) = remove_vig(0.55, 0.50);
        assert!((a - 0.5238).abs() < 1e-4);
        assert!((b - 0.4762).abs() < 1e-4);
        assert_eq!(a + b, 1.0);
    }

    #[test]
    fn test_remove_vig_leaves_fair_pairs() {
        assert_eq!(remove_vig(0.5, 0.5), (0.5, 0.5));
        assert_eq!(remove_vig(0.45, 0.50), (0.45, 0.50));
    }

    #[test]
    fn test_logit_sigmoid_round_trip() {
        for z in [-8.0, -2.5, -0.3, 0.0, 0.7, 3.0, 8.0] {
            let back = logit(sigmoid(z).unwrap()).unwrap();
            assert!((back - z).abs() < 1e-9, "z={z} back={back}");
        }
        for p in [0.001, 0.1, 0.5, 0.6255, 0.9, 0.999] {
            let back = sigmoid(logit(p).unwrap()).unwrap();
            assert!((back - p).abs() < 1e-9, "p={p} back={back}");
        }
    }

    #[test]
    fn test_logit_domain() {
        assert!(logit(0.0).is_err());
        assert!(logit(1.0).is_err());
        assert!(logit(-0.2).is_err());
        assert!(logit(1.2).is_err());
    }

    #[test]
    fn test_sigmoid_saturation_is_an_error() {
        assert!(matches!(sigmoid(40.0), Err(EngineError::ProbabilityOutOfRange(_))));
        assert!(sigmoid(-800.0).is_err());
    }

    #[test]
    fn test_phi_known_values() {
        assert!((phi(0.0) - 0.5).abs() < 1e-7);
        assert!((phi(1.0) - 0.841_344_746).abs() < 1e-7);
        assert!((phi(-1.96) - 0.024_997_895).abs() < 1e-7);
        assert!((phi(0.32) - 0.625_515_83).abs() < 1e-7);
    }

    #[test]
    fn test_phi_symmetry() {
        for x in [0.1, 0.5, 1.3, 2.7] {
            assert!((phi(x) + phi(-x) - 1.0).abs() < 1e-7);
        }
    }
}
