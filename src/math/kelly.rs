//! Kelly criterion position sizing.
//!
//! Fractional Kelly on American odds, a capped calculator used by the
//! analyzer, and the stake-to-units display scale.

use tracing::debug;

use super::{american_to_decimal, american_to_prob, calculate_ev, check_probability};
use crate::types::{EngineError, EngineResult};

/// Default fractional Kelly multiplier (quarter-Kelly).
pub const DEFAULT_KELLY_FRACTION: f64 = 0.25;

/// Stake/bankroll breakpoints for the 0.5–5 unit scale. A fraction below
/// the first element of a pair maps to the second.
const UNIT_BREAKPOINTS: &[(f64, f64)] = &[
    (0.005, 0.5),
    (0.010, 1.0),
    (0.015, 1.5),
    (0.020, 2.0),
    (0.025, 2.5),
    (0.030, 3.0),
    (0.040, 4.0),
];

const MAX_UNITS: f64 = 5.0;

/// Fractional Kelly stake in currency.
///
/// Full Kelly `f* = (b·p − q) / b` with `b = decimal − 1`, scaled by
/// `kelly_fraction`. Exactly zero whenever `p` does not beat the
/// price's implied probability.
pub fn calculate_kelly_stake(
    probability: f64,
    american_odds: f64,
    bankroll: f64,
    kelly_fraction: f64,
) -> EngineResult<f64> {
    let p = check_probability(probability)?;
    if !kelly_fraction.is_finite() || kelly_fraction < 0.0 {
        return Err(EngineError::InvalidInput {
            field: "kelly_fraction".into(),
            message: format!("must be non-negative, got {kelly_fraction}"),
        });
    }
    if !bankroll.is_finite() || bankroll <= 0.0 {
        return Ok(0.0);
    }

    let implied = american_to_prob(american_odds)?;
    if p <= implied {
        return Ok(0.0);
    }

    let b = american_to_decimal(american_odds)? - 1.0;
    let q = 1.0 - p;
    let full_kelly = (b * p - q) / b;

    Ok((full_kelly * kelly_fraction * bankroll).max(0.0))
}

/// Map a stake to the 0.5–5 unit scale. Zero for no stake.
pub fn kelly_to_units(kelly_stake: f64, bankroll: f64) -> f64 {
    if kelly_stake <= 0.0 || bankroll <= 0.0 {
        return 0.0;
    }
    let fraction = kelly_stake / bankroll;
    UNIT_BREAKPOINTS
        .iter()
        .find(|(limit, _)| fraction < *limit)
        .map(|(_, units)| *units)
        .unwrap_or(MAX_UNITS)
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Kelly sizing configuration.
#[derive(Debug, Clone)]
pub struct KellyConfig {
    /// Fractional Kelly multiplier (0.25 = quarter-Kelly). Lower = more conservative.
    pub multiplier: f64,
    /// Maximum bet as a fraction of bankroll.
    pub max_bet_pct: f64,
    /// Minimum stake in currency (below this, don't bother).
    pub min_bet_size: f64,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_KELLY_FRACTION,
            max_bet_pct: 0.05, // 5 units on a 100-unit bankroll
            min_bet_size: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Kelly calculator
// ---------------------------------------------------------------------------

/// Sized bet recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct SizedBet {
    pub kelly_fraction: f64, // Raw (full) Kelly fraction
    pub bet_fraction: f64,   // After multiplier + cap
    pub stake: f64,          // Currency amount
    pub units: f64,
    pub expected_value: f64, // EV of the stake in currency
}

pub struct KellyCalculator {
    config: KellyConfig,
}

impl KellyCalculator {
    pub fn new(config: KellyConfig) -> Self {
        Self { config }
    }

    /// Size a bet at `american_odds` for a model `probability`.
    ///
    /// Returns `Ok(None)` when Kelly says not to bet or the stake falls
    /// below the configured floor; domain errors propagate.
    pub fn size_bet(
        &self,
        probability: f64,
        american_odds: f64,
        bankroll: f64,
    ) -> EngineResult<Option<SizedBet>> {
        if bankroll <= 0.0 {
            return Ok(None);
        }

        // Full Kelly as a bankroll fraction.
        let kelly = calculate_kelly_stake(probability, american_odds, 1.0, 1.0)?;
        if kelly <= 0.0 {
            debug!(probability, american_odds, "Non-positive Kelly, no bet");
            return Ok(None);
        }

        let fractional = kelly * self.config.multiplier;
        let capped = fractional.min(self.config.max_bet_pct);
        let stake = (capped * bankroll).max(0.0);

        if stake < self.config.min_bet_size {
            debug!(
                stake,
                min = self.config.min_bet_size,
                "Bet below minimum size"
            );
            return Ok(None);
        }

        let expected_value = calculate_ev(probability, american_odds, stake)?;
        let units = kelly_to_units(stake, bankroll);

        debug!(
            raw_kelly = format!("{:.2}%", kelly * 100.0),
            fractional = format!("{:.2}%", capped * 100.0),
            stake = format!("${:.2}", stake),
            units,
            ev = format!("${:.4}", expected_value),
            "Bet sized"
        );

        Ok(Some(SizedBet {
            kelly_fraction: kelly,
            bet_fraction: capped,
            stake,
            units,
            expected_value,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
