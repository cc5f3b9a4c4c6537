//! Prediction heads.
//!
//! One head per wager type (spread, total, moneyline). Each head turns
//! the market baseline plus the aggregated factor deviation into a
//! probability, an EV at the offered price and a set of pass/fail gates.
//! Heads that clear every gate are ranked by EV; rank 1 is the pick.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::math::{
    american_to_prob, calculate_edge_attribution, calculate_ev, check_probability, logit, phi,
    remove_vig, sigmoid, test_slippage, EdgeAttribution, SlippageResult, DEFAULT_MAX_STRUCTURAL_PCT,
    DEFAULT_SLIPPAGE_CENTS,
};
use crate::types::{
    EngineError, EngineResult, FactorCategory, LeagueParameters, MarketLines, Selection,
    SharpFactor, TeamSide, TotalSide, WagerType,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Caller-supplied switches and robustness settings for the heads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadsConfig {
    pub spread_enabled: bool,
    pub total_enabled: bool,
    pub moneyline_enabled: bool,
    /// Adverse price move (cents) a pick must survive.
    pub slippage_cents: f64,
    /// Minimum share of the deviation that must be structural.
    pub min_structural_pct: f64,
    pub max_structural_pct: f64,
}

impl Default for HeadsConfig {
    fn default() -> Self {
        Self {
            spread_enabled: true,
            total_enabled: true,
            moneyline_enabled: true,
            slippage_cents: DEFAULT_SLIPPAGE_CENTS,
            min_structural_pct: 0.6,
            max_structural_pct: DEFAULT_MAX_STRUCTURAL_PCT,
        }
    }
}

impl HeadsConfig {
    pub fn is_enabled(&self, wager: WagerType) -> bool {
        match wager {
            WagerType::Spread => self.spread_enabled,
            WagerType::Total => self.total_enabled,
            WagerType::Moneyline => self.moneyline_enabled,
        }
    }
}

// ---------------------------------------------------------------------------
// Head types
// ---------------------------------------------------------------------------

/// Individual gate results for one head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadGates {
    pub deviation: bool,
    pub ev: bool,
    pub odds_range: bool,
    pub slippage: bool,
    pub attribution: bool,
}

impl HeadGates {
    pub fn all(&self) -> bool {
        self.deviation && self.ev && self.odds_range && self.slippage && self.attribution
    }

    /// Names of the gates that failed, for the decision log.
    pub fn failures(&self) -> Vec<&'static str> {
        [
            (self.deviation, "deviation"),
            (self.ev, "ev"),
            (self.odds_range, "odds_range"),
            (self.slippage, "slippage"),
            (self.attribution, "attribution"),
        ]
        .iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, name)| *name)
        .collect()
    }
}

/// Full evaluation of one wager type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionHead {
    pub wager_type: WagerType,
    pub selection: Selection,
    /// Line from the selection's perspective (None for moneyline).
    pub market_line: Option<f64>,
    pub odds: f64,
    /// Signed factor sum: positive = home (spread/moneyline) or over (total).
    pub predicted_deviation: f64,
    /// Market baseline plus deviation: home line, total, or true home log-odds.
    pub true_line: f64,
    /// Vig-free market probability of the selection.
    pub market_probability: f64,
    pub probability: f64,
    /// EV per unit staked (fraction, not percent).
    pub ev: f64,
    pub slippage: SlippageResult,
    pub attribution: EdgeAttribution,
    pub gates: HeadGates,
    pub enabled: bool,
    pub overall_threshold_met: bool,
    pub rank: Option<u8>,
    pub is_selected: bool,
}

impl PredictionHead {
    pub fn ev_pct(&self) -> f64 {
        self.ev * 100.0
    }
}

impl fmt::Display for PredictionHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({:+.0}) | dev={:+.2} P={:.1}% EV={:+.2}% | {}",
            self.wager_type,
            self.selection,
            self.odds,
            self.predicted_deviation,
            self.probability * 100.0,
            self.ev_pct(),
            if self.overall_threshold_met { "PASS" } else { "NO BET" },
        )
    }
}

/// The three heads plus the best-ranked passing head (if any).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreePredictionHeads {
    pub spread: PredictionHead,
    pub total: PredictionHead,
    pub moneyline: PredictionHead,
    pub best_pick: Option<PredictionHead>,
}

impl ThreePredictionHeads {
    /// Heads in evaluation order.
    pub fn heads(&self) -> [&PredictionHead; 3] {
        [&self.spread, &self.total, &self.moneyline]
    }

    /// Passing heads by rank.
    pub fn ranked(&self) -> Vec<&PredictionHead> {
        let mut ranked: Vec<&PredictionHead> =
            self.heads().into_iter().filter(|h| h.rank.is_some()).collect();
        ranked.sort_by_key(|h| h.rank);
        ranked
    }
}

// ---------------------------------------------------------------------------
// Factor aggregation
// ---------------------------------------------------------------------------

/// Signed factor sums for one wager type.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Deviation {
    pub total: f64,
    pub structural: f64,
    pub market: f64,
}

/// Sum signed contributions for the wager type, split by category.
/// Contributions are pre-clipped upstream and summed as-is.
pub fn aggregate_deviation(factors: &[SharpFactor], wager: WagerType) -> Deviation {
    let unit = wager.unit();
    factors
        .iter()
        .filter(|f| f.unit() == unit)
        .fold(Deviation::default(), |mut acc, f| {
            let c = f.signed_contribution();
            acc.total += c;
            match f.category {
                FactorCategory::Structural => acc.structural += c,
                FactorCategory::Market => acc.market += c,
            }
            acc
        })
}

fn validate_sigma(sigma: f64) -> EngineResult<f64> {
    if sigma.is_finite() && sigma > 0.0 {
        Ok(sigma)
    } else {
        Err(EngineError::InvalidSigma(sigma))
    }
}

/// Everything a head needs once the wager-specific math is done.
struct Evaluated {
    wager_type: WagerType,
    selection: Selection,
    market_line: Option<f64>,
    odds: f64,
    deviation: Deviation,
    true_line: f64,
    market_probability: f64,
    probability: f64,
    deviation_gate: bool,
    min_ev: f64,
    odds_range_gate: bool,
}

fn finish(e: Evaluated, config: &HeadsConfig) -> EngineResult<PredictionHead> {
    let ev = calculate_ev(e.probability, e.odds, 1.0)?;
    let slippage = test_slippage(e.probability, e.odds, config.slippage_cents)?;
    let attribution = calculate_edge_attribution(
        e.deviation.total,
        e.deviation.structural,
        e.deviation.market,
        config.min_structural_pct,
        config.max_structural_pct,
    );

    let gates = HeadGates {
        deviation: e.deviation_gate,
        ev: ev >= e.min_ev,
        odds_range: e.odds_range_gate,
        slippage: slippage.passes,
        attribution: attribution.passes,
    };
    let enabled = config.is_enabled(e.wager_type);
    let overall_threshold_met = enabled && gates.all();

    debug!(
        wager = %e.wager_type,
        selection = %e.selection,
        deviation = format!("{:+.3}", e.deviation.total),
        probability = format!("{:.2}%", e.probability * 100.0),
        ev = format!("{:+.2}%", ev * 100.0),
        worst_ev = format!("{:+.2}%", slippage.ev_worst * 100.0),
        structural = format!("{:.0}%", attribution.structural_share * 100.0),
        failed = ?gates.failures(),
        enabled,
        "Head evaluated"
    );

    Ok(PredictionHead {
        wager_type: e.wager_type,
        selection: e.selection,
        market_line: e.market_line,
        odds: e.odds,
        predicted_deviation: e.deviation.total,
        true_line: e.true_line,
        market_probability: e.market_probability,
        probability: e.probability,
        ev,
        slippage,
        attribution,
        gates,
        enabled,
        overall_threshold_met,
        rank: None,
        is_selected: false,
    })
}

// ---------------------------------------------------------------------------
// Per-wager evaluation
// ---------------------------------------------------------------------------

/// Point-spread head. The market line is taken at face value (50/50 at
/// the number), so cover probability is `phi(|deviation| / sigma)`.
pub fn spread_head(
    market: &MarketLines,
    sigma_spread: f64,
    factors: &[SharpFactor],
    params: &LeagueParameters,
    config: &HeadsConfig,
) -> EngineResult<PredictionHead> {
    let sigma = validate_sigma(sigma_spread)?;
    let deviation = aggregate_deviation(factors, WagerType::Spread);
    let d = deviation.total;

    // No lean: evaluate the market favorite (home on a pick'em).
    let side = if d > 0.0 {
        TeamSide::Home
    } else if d < 0.0 {
        TeamSide::Away
    } else if market.spread <= 0.0 {
        TeamSide::Home
    } else {
        TeamSide::Away
    };

    let (odds, line) = match side {
        TeamSide::Home => (market.spread_home_odds, market.spread),
        TeamSide::Away => (market.spread_away_odds, -market.spread),
    };
    let (fair_home, fair_away) = remove_vig(
        american_to_prob(market.spread_home_odds)?,
        american_to_prob(market.spread_away_odds)?,
    );

    let probability = check_probability(phi(d.abs() / sigma))?;

    finish(
        Evaluated {
            wager_type: WagerType::Spread,
            selection: side.into(),
            market_line: Some(line),
            odds,
            deviation,
            true_line: market.spread - d,
            market_probability: if side == TeamSide::Home { fair_home } else { fair_away },
            probability,
            deviation_gate: d.abs() >= params.min_deviation_spread,
            min_ev: params.min_ev_spread,
            odds_range_gate: odds >= params.max_juice,
        },
        config,
    )
}

/// Total head; positive deviation leans over.
pub fn total_head(
    market: &MarketLines,
    sigma_total: f64,
    factors: &[SharpFactor],
    params: &LeagueParameters,
    config: &HeadsConfig,
) -> EngineResult<PredictionHead> {
    let sigma = validate_sigma(sigma_total)?;
    let deviation = aggregate_deviation(factors, WagerType::Total);
    let d = deviation.total;

    // No lean: evaluate whichever side is priced as the favorite (over on a tie).
    let side = if d > 0.0 {
        TotalSide::Over
    } else if d < 0.0 {
        TotalSide::Under
    } else if market.over_odds <= market.under_odds {
        TotalSide::Over
    } else {
        TotalSide::Under
    };

    let odds = match side {
        TotalSide::Over => market.over_odds,
        TotalSide::Under => market.under_odds,
    };
    let (fair_over, fair_under) = remove_vig(
        american_to_prob(market.over_odds)?,
        american_to_prob(market.under_odds)?,
    );

    let probability = check_probability(phi(d.abs() / sigma))?;

    finish(
        Evaluated {
            wager_type: WagerType::Total,
            selection: side.into(),
            market_line: Some(market.total),
            odds,
            deviation,
            true_line: market.total + d,
            market_probability: if side == TotalSide::Over { fair_over } else { fair_under },
            probability,
            deviation_gate: d.abs() >= params.min_deviation_total,
            min_ev: params.min_ev_total,
            odds_range_gate: odds >= params.max_juice,
        },
        config,
    )
}

/// Moneyline head: vig-free fair log-odds plus the log-odds deviation.
pub fn moneyline_head(
    market: &MarketLines,
    factors: &[SharpFactor],
    params: &LeagueParameters,
    config: &HeadsConfig,
) -> EngineResult<PredictionHead> {
    let deviation = aggregate_deviation(factors, WagerType::Moneyline);
    let d = deviation.total;

    let (fair_home, fair_away) = remove_vig(
        american_to_prob(market.moneyline_home)?,
        american_to_prob(market.moneyline_away)?,
    );
    let true_logit = logit(fair_home)? + d;
    let p_home = sigmoid(true_logit)?;

    // No lean: evaluate the market favorite (home when priced equally).
    let side = if d > 0.0 {
        TeamSide::Home
    } else if d < 0.0 {
        TeamSide::Away
    } else if market.moneyline_home <= market.moneyline_away {
        TeamSide::Home
    } else {
        TeamSide::Away
    };

    let (odds, probability, market_probability) = match side {
        TeamSide::Home => (market.moneyline_home, p_home, fair_home),
        TeamSide::Away => (market.moneyline_away, check_probability(1.0 - p_home)?, fair_away),
    };

    let laying_favorite = odds < 0.0;
    let min_ev = if laying_favorite {
        params.min_ev_moneyline_favorite
    } else {
        params.min_ev_moneyline_underdog
    };

    finish(
        Evaluated {
            wager_type: WagerType::Moneyline,
            selection: side.into(),
            market_line: None,
            odds,
            deviation,
            true_line: true_logit,
            market_probability,
            probability,
            // Moneyline has no point threshold; EV and price gates cover it.
            deviation_gate: true,
            min_ev,
            odds_range_gate: !laying_favorite || odds >= params.max_favorite_price,
        },
        config,
    )
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Order of passing heads: EV descending, ties broken by evaluation order
/// (spread, total, moneyline).
fn ranking_order(heads: &[&PredictionHead]) -> Vec<WagerType> {
    let mut passing: Vec<&PredictionHead> = heads
        .iter()
        .copied()
        .filter(|h| h.overall_threshold_met)
        .collect();
    passing.sort_by(|a, b| {
        b.ev.total_cmp(&a.ev)
            .then_with(|| a.wager_type.cmp(&b.wager_type))
    });
    passing.iter().map(|h| h.wager_type).collect()
}

fn ranked(head: PredictionHead, order: &[WagerType]) -> PredictionHead {
    let rank = order
        .iter()
        .position(|w| *w == head.wager_type)
        .map(|i| (i + 1) as u8);
    PredictionHead {
        rank,
        is_selected: rank == Some(1),
        ..head
    }
}

/// Evaluate all three heads and pick the best passing one.
pub fn calculate_heads(
    market: &MarketLines,
    sigma_spread: f64,
    sigma_total: f64,
    factors: &[SharpFactor],
    params: &LeagueParameters,
    config: &HeadsConfig,
) -> EngineResult<ThreePredictionHeads> {
    let spread = spread_head(market, sigma_spread, factors, params, config)?;
    let total = total_head(market, sigma_total, factors, params, config)?;
    let moneyline = moneyline_head(market, factors, params, config)?;

    let order = ranking_order(&[&spread, &total, &moneyline]);

    let spread = ranked(spread, &order);
    let total = ranked(total, &order);
    let moneyline = ranked(moneyline, &order);

    let best_pick = [&spread, &total, &moneyline]
        .into_iter()
        .find(|h| h.is_selected)
        .cloned();

    Ok(ThreePredictionHeads {
        spread,
        total,
        moneyline,
        best_pick,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
