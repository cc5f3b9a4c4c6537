//! Strategy engine: prediction heads, Kelly sizing and pick grading.

pub mod confluence;
pub mod heads;

use chrono::Utc;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::history::TrackRecord;
use crate::math::{KellyCalculator, SizedBet};
use crate::model::predict_score;
use crate::types::{
    EngineError, EngineResult, GameInput, LeagueParameters, PickRecord, ScorePrediction,
    Selection, SharpFactor, WagerType,
};
use confluence::{calculate_confluence_score, edge_score_from_ev, factor_alignment};
use heads::{calculate_heads, PredictionHead, ThreePredictionHeads};

/// Top factors quoted in a pick's reasoning trail.
const REASONING_FACTORS: usize = 3;

// ---------------------------------------------------------------------------
// Decision log
// ---------------------------------------------------------------------------

/// What happened to each head during an analysis, including the ones that
/// were passed on and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DecisionRecord {
    /// Rank 1, sized and turned into a pick.
    Selected { wager_type: WagerType, stake: f64, units: f64 },
    /// Head switched off in configuration.
    Disabled { wager_type: WagerType },
    /// One or more gates failed.
    GateRejected { wager_type: WagerType, failed: Vec<String> },
    /// Passed every gate but another head had more EV.
    Outranked { wager_type: WagerType, rank: u8 },
    /// Best head, but Kelly sizing returned nothing (zero or under the floor).
    KellyRejected { wager_type: WagerType },
}

/// Why no pick was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassReason {
    NoHeadPassed,
    KellyRejected,
}

/// Result of one game. `Pass` is a normal outcome, not an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Pick(Box<PickRecord>),
    Pass(PassReason),
}

impl AnalysisOutcome {
    pub fn pick(&self) -> Option<&PickRecord> {
        match self {
            AnalysisOutcome::Pick(pick) => Some(pick),
            AnalysisOutcome::Pass(_) => None,
        }
    }

    pub fn is_pick(&self) -> bool {
        matches!(self, AnalysisOutcome::Pick(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub game_id: String,
    pub prediction: ScorePrediction,
    pub heads: ThreePredictionHeads,
    pub decisions: Vec<DecisionRecord>,
    pub outcome: AnalysisOutcome,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Pipelines score prediction → heads → Kelly sizing → pick record.
///
/// Holds only the caller-supplied configuration; `analyze` is pure over its
/// arguments and may be called from many threads at once.
pub struct Analyzer {
    config: EngineConfig,
    kelly: KellyCalculator,
}

impl Analyzer {
    pub fn new(config: EngineConfig) -> Self {
        let kelly = KellyCalculator::new(config.kelly());
        Self { config, kelly }
    }

    /// Run the full pipeline for one game.
    ///
    /// Steps:
    /// 1. Predict the score (margin, total, σ).
    /// 2. Evaluate and rank the three heads.
    /// 3. Kelly-size the rank 1 head.
    /// 4. Build the pick record, graded against `history` when supplied.
    ///
    /// Failed gates yield `AnalysisOutcome::Pass`; malformed numeric input
    /// yields `Err`.
    pub fn analyze(
        &self,
        game: &GameInput,
        factors: &[SharpFactor],
        params: &LeagueParameters,
        history: Option<&TrackRecord>,
    ) -> EngineResult<Analysis> {
        let prediction = predict_score(game)?;
        let heads = calculate_heads(
            &game.market,
            prediction.sigma_spread,
            prediction.sigma_total,
            factors,
            params,
            &self.config.heads,
        )?;

        let mut decisions: Vec<DecisionRecord> = heads
            .heads()
            .iter()
            .filter(|h| !h.is_selected)
            .map(|h| head_decision(h))
            .collect();

        let Some(best) = heads.best_pick.as_ref() else {
            info!(game_id = %game.id, "No head cleared its gates, passing");
            return Ok(Analysis {
                game_id: game.id.clone(),
                prediction,
                heads,
                decisions,
                outcome: AnalysisOutcome::Pass(PassReason::NoHeadPassed),
            });
        };

        let Some(sized) = self
            .kelly
            .size_bet(best.probability, best.odds, self.config.bankroll)?
        else {
            debug!(
                game_id = %game.id,
                wager = %best.wager_type,
                "Kelly rejected the best head"
            );
            decisions.push(DecisionRecord::KellyRejected { wager_type: best.wager_type });
            let outcome = AnalysisOutcome::Pass(PassReason::KellyRejected);
            return Ok(Analysis {
                game_id: game.id.clone(),
                prediction,
                heads,
                decisions,
                outcome,
            });
        };

        let mut pick = self.build_pick(game, &prediction, best, &sized, factors)?;
        if self.config.confluence {
            if let Some(record) = history {
                let input = record.confluence_input(
                    game.sport,
                    best.wager_type,
                    edge_score_from_ev(best.ev),
                    factor_alignment(factors, best),
                );
                pick.confluence = Some(calculate_confluence_score(&input));
            }
        }

        info!(
            game_id = %game.id,
            pick = %pick.selection_text,
            odds = format!("{:+.0}", pick.odds),
            stake = format!("${:.2}", sized.stake),
            units = sized.units,
            ev = format!("{:+.2}%", pick.ev_pct),
            tier = pick.confluence.as_ref().map(|c| c.tier.to_string()).unwrap_or_default(),
            "Pick selected"
        );

        decisions.push(DecisionRecord::Selected {
            wager_type: best.wager_type,
            stake: sized.stake,
            units: sized.units,
        });

        Ok(Analysis {
            game_id: game.id.clone(),
            prediction,
            heads,
            decisions,
            outcome: AnalysisOutcome::Pick(Box::new(pick)),
        })
    }

    fn build_pick(
        &self,
        game: &GameInput,
        prediction: &ScorePrediction,
        head: &PredictionHead,
        sized: &SizedBet,
        factors: &[SharpFactor],
    ) -> EngineResult<PickRecord> {
        Ok(PickRecord {
            id: Uuid::new_v4(),
            game_id: game.id.clone(),
            created_at: Utc::now(),
            sport: game.sport,
            wager_type: head.wager_type,
            selection: head.selection,
            selection_text: selection_text(game, head),
            odds: head.odds,
            units: to_decimal(sized.units, "units")?.round_dp(1),
            stake: to_decimal(sized.stake, "stake")?.round_dp(2),
            confidence: head.probability,
            ev_pct: head.ev_pct(),
            reasoning: reasoning(game, prediction, head, factors, self.config.heads.slippage_cents),
            confluence: None,
        })
    }
}

fn head_decision(head: &PredictionHead) -> DecisionRecord {
    let wager_type = head.wager_type;
    if !head.enabled {
        DecisionRecord::Disabled { wager_type }
    } else if let Some(rank) = head.rank {
        DecisionRecord::Outranked { wager_type, rank }
    } else {
        DecisionRecord::GateRejected {
            wager_type,
            failed: head.gates.failures().into_iter().map(String::from).collect(),
        }
    }
}

fn to_decimal(value: f64, field: &str) -> EngineResult<Decimal> {
    Decimal::from_f64(value).ok_or_else(|| EngineError::InvalidInput {
        field: field.to_string(),
        message: format!("not representable as a decimal: {value}"),
    })
}

fn format_line(line: f64) -> String {
    if line == 0.0 {
        "PK".to_string()
    } else {
        format!("{line:+}")
    }
}

/// "LAL -3.5", "Over 224.5", "BOS ML".
pub fn selection_text(game: &GameInput, head: &PredictionHead) -> String {
    let team = |selection: Selection| match selection {
        Selection::Away => game.away.abbreviation.as_str(),
        _ => game.home.abbreviation.as_str(),
    };
    match head.wager_type {
        WagerType::Spread => format!(
            "{} {}",
            team(head.selection),
            format_line(head.market_line.unwrap_or(0.0))
        ),
        WagerType::Total => format!(
            "{} {}",
            if head.selection == Selection::Under { "Under" } else { "Over" },
            head.market_line.unwrap_or(game.market.total)
        ),
        WagerType::Moneyline => format!("{} ML", team(head.selection)),
    }
}

fn reasoning(
    game: &GameInput,
    prediction: &ScorePrediction,
    head: &PredictionHead,
    factors: &[SharpFactor],
    slippage_cents: f64,
) -> Vec<String> {
    let mut trail = vec![format!(
        "Model: {} {:.1} - {} {:.1} (margin {:+.1}, total {:.1})",
        game.home.abbreviation,
        prediction.home_score,
        game.away.abbreviation,
        prediction.away_score,
        prediction.true_spread,
        prediction.true_total,
    )];

    trail.push(match head.wager_type {
        WagerType::Moneyline => format!(
            "Factor deviation {:+.3} log-odds over the vig-free market",
            head.predicted_deviation
        ),
        _ => format!(
            "Factor deviation {:+.2} points, true line {:.1}",
            head.predicted_deviation, head.true_line
        ),
    });

    trail.push(format!(
        "Probability {:.1}% vs market {:.1}%",
        head.probability * 100.0,
        head.market_probability * 100.0
    ));
    trail.push(format!(
        "EV {:+.2}% at {:+.0}, {:+.2}% after {} cents of slippage",
        head.ev_pct(),
        head.odds,
        head.slippage.ev_worst * 100.0,
        slippage_cents
    ));
    trail.push(format!(
        "{:.0}% of the edge is structural",
        head.attribution.structural_share * 100.0
    ));

    let unit = head.wager_type.unit();
    let mut relevant: Vec<&SharpFactor> = factors
        .iter()
        .filter(|f| f.unit() == unit && f.signed_contribution() != 0.0)
        .collect();
    relevant.sort_by(|a, b| {
        b.signed_contribution()
            .abs()
            .total_cmp(&a.signed_contribution().abs())
    });
    trail.extend(relevant.iter().take(REASONING_FACTORS).map(|f| f.to_string()));
    trail
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
