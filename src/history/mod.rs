//! Track record of settled picks.
//!
//! Feeds the confluence scorer (specialization win rate, current streak)
//! and reports calibration of the model's probabilities.

pub mod calibration;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::strategy::confluence::ConfluenceInput;
use crate::types::{EngineError, EngineResult, PickRecord, Sport, WagerType};
pub use calibration::{calibration_report, CalibrationBucket, CalibrationDiagnosis, CalibrationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickResult {
    Win,
    Loss,
    Push,
}

impl fmt::Display for PickResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickResult::Win => write!(f, "W"),
            PickResult::Loss => write!(f, "L"),
            PickResult::Push => write!(f, "P"),
        }
    }
}

/// A pick after its game has been settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedPick {
    pub pick_id: Uuid,
    pub sport: Sport,
    pub wager_type: WagerType,
    pub odds: f64,
    pub stake: Decimal,
    /// Model probability at the time of the pick.
    pub confidence: f64,
    pub result: PickResult,
    pub settled_at: DateTime<Utc>,
}

impl GradedPick {
    pub fn from_pick(pick: &PickRecord, result: PickResult, settled_at: DateTime<Utc>) -> Self {
        Self {
            pick_id: pick.id,
            sport: pick.sport,
            wager_type: pick.wager_type,
            odds: pick.odds,
            stake: pick.stake,
            confidence: pick.confidence,
            result,
            settled_at,
        }
    }

    /// Net profit in currency: the payout on a win, minus the stake on a
    /// loss, zero on a push.
    pub fn profit(&self) -> EngineResult<Decimal> {
        if !self.odds.is_finite() {
            return Err(EngineError::InvalidOdds(self.odds));
        }
        if self.odds == 0.0 {
            return Err(EngineError::ZeroOdds);
        }
        if self.odds.abs() < 100.0 {
            return Err(EngineError::InvalidOdds(self.odds));
        }
        let odds = Decimal::from_f64(self.odds).ok_or(EngineError::InvalidOdds(self.odds))?;
        let hundred = Decimal::ONE_HUNDRED;
        Ok(match self.result {
            PickResult::Win if odds > Decimal::ZERO => self.stake * odds / hundred,
            PickResult::Win => self.stake * hundred / odds.abs(),
            PickResult::Loss => -self.stake,
            PickResult::Push => Decimal::ZERO,
        })
    }
}

/// Win rate for one sport and wager type. Pushes don't count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Specialization {
    pub wins: u32,
    pub losses: u32,
    pub pushes: u32,
}

impl Specialization {
    /// Decided picks (wins + losses).
    pub fn sample(&self) -> u32 {
        self.wins + self.losses
    }

    pub fn win_rate(&self) -> Option<f64> {
        match self.sample() {
            0 => None,
            n => Some(self.wins as f64 / n as f64),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackRecord {
    picks: Vec<GradedPick>,
}

impl TrackRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_picks(picks: Vec<GradedPick>) -> Self {
        Self { picks }
    }

    pub fn add(&mut self, pick: GradedPick) {
        self.picks.push(pick);
    }

    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    pub fn specialization(&self, sport: Sport, wager_type: WagerType) -> Specialization {
        self.picks
            .iter()
            .filter(|p| p.sport == sport && p.wager_type == wager_type)
            .fold(
                Specialization { wins: 0, losses: 0, pushes: 0 },
                |mut s, p| {
                    match p.result {
                        PickResult::Win => s.wins += 1,
                        PickResult::Loss => s.losses += 1,
                        PickResult::Push => s.pushes += 1,
                    }
                    s
                },
            )
    }

    /// Consecutive wins counting back from the most recently settled pick.
    /// Pushes neither extend nor break the streak.
    pub fn current_streak(&self) -> u32 {
        let mut settled: Vec<&GradedPick> = self.picks.iter().collect();
        settled.sort_by(|a, b| b.settled_at.cmp(&a.settled_at));
        settled
            .iter()
            .filter(|p| p.result != PickResult::Push)
            .take_while(|p| p.result == PickResult::Win)
            .count() as u32
    }

    /// Sum of profit across all settled picks.
    pub fn net_profit(&self) -> EngineResult<Decimal> {
        self.picks.iter().map(GradedPick::profit).sum()
    }

    pub fn calibration(&self) -> CalibrationReport {
        calibration_report(&self.picks)
    }

    /// Historical half of the confluence input for a new pick.
    pub fn confluence_input(
        &self,
        sport: Sport,
        wager_type: WagerType,
        edge_score: f64,
        alignment_pct: f64,
    ) -> ConfluenceInput {
        let spec = self.specialization(sport, wager_type);
        ConfluenceInput {
            edge_score,
            specialization_win_rate: spec.win_rate(),
            specialization_sample: spec.sample(),
            streak: self.current_streak(),
            alignment_pct,
        }
    }
}
