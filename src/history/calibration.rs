//! Calibration of settled picks.
//!
//! Compares each pick's model probability with how often picks at that
//! probability actually won. Brier scores overall and per wager type,
//! plus a binned calibration curve. Pushes carry no information and are
//! left out.

use serde::Serialize;
use std::collections::BTreeMap;

use super::{GradedPick, PickResult};
use crate::types::WagerType;

const NUM_BINS: usize = 10;
const MIN_BUCKET_COUNT: usize = 3;
const MIN_POINTS: usize = 20;
const TOLERANCE: f64 = 0.05;

/// A bucket in the calibration curve (e.g. all picks between 0.60 and 0.70).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationBucket {
    pub bin_start: f64,
    pub bin_end: f64,
    pub mean_predicted: f64,
    pub actual_rate: f64,
    pub count: usize,
}

impl CalibrationBucket {
    /// Predicted minus actual. Positive means the model was too high.
    pub fn bias(&self) -> f64 {
        self.mean_predicted - self.actual_rate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CalibrationDiagnosis {
    WellCalibrated,
    /// Picks win less often than their probabilities claim.
    OverConfident,
    UnderConfident,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    pub total_picks: usize,
    pub overall_brier: f64,
    pub brier_by_wager: BTreeMap<WagerType, f64>,
    /// Populated bins only.
    pub curve: Vec<CalibrationBucket>,
    pub diagnosis: CalibrationDiagnosis,
}

/// (probability, won) pairs for decided picks.
fn decided(picks: &[GradedPick]) -> Vec<(f64, bool, WagerType)> {
    picks
        .iter()
        .filter(|p| p.result != PickResult::Push)
        .map(|p| (p.confidence, p.result == PickResult::Win, p.wager_type))
        .collect()
}

/// Brier = (1/N) · Σ(predicted − outcome)². 0 is perfect, 0.25 is a coin flip.
fn brier<'a, I>(points: I) -> f64
where
    I: IntoIterator<Item = &'a (f64, bool, WagerType)>,
{
    let (sum, n) = points.into_iter().fold((0.0, 0usize), |(sum, n), (p, won, _)| {
        let outcome = if *won { 1.0 } else { 0.0 };
        (sum + (p - outcome).powi(2), n + 1)
    });
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn bin_index(p: f64) -> usize {
    ((p * NUM_BINS as f64) as usize).min(NUM_BINS - 1)
}

fn curve(points: &[(f64, bool, WagerType)]) -> Vec<CalibrationBucket> {
    let width = 1.0 / NUM_BINS as f64;
    let mut bins: Vec<Vec<&(f64, bool, WagerType)>> = vec![Vec::new(); NUM_BINS];
    for point in points {
        bins[bin_index(point.0)].push(point);
    }

    bins.iter()
        .enumerate()
        .filter(|(_, in_bin)| !in_bin.is_empty())
        .map(|(i, in_bin)| {
            let count = in_bin.len();
            let mean_predicted = in_bin.iter().map(|(p, _, _)| p).sum::<f64>() / count as f64;
            let actual_rate = in_bin.iter().filter(|(_, won, _)| *won).count() as f64 / count as f64;
            CalibrationBucket {
                bin_start: i as f64 * width,
                bin_end: (i + 1) as f64 * width,
                mean_predicted,
                actual_rate,
                count,
            }
        })
        .collect()
}

fn diagnose(total: usize, curve: &[CalibrationBucket]) -> CalibrationDiagnosis {
    let populated: Vec<&CalibrationBucket> =
        curve.iter().filter(|b| b.count >= MIN_BUCKET_COUNT).collect();
    if total < MIN_POINTS || populated.is_empty() {
        return CalibrationDiagnosis::InsufficientData;
    }

    let (over, under) = populated
        .iter()
        .filter(|b| b.bias().abs() >= TOLERANCE)
        .fold((0usize, 0usize), |(over, under), b| {
            if b.bias() > 0.0 {
                (over + b.count, under)
            } else {
                (over, under + b.count)
            }
        });

    // Majority of picks sitting in miscalibrated bins decides the verdict.
    let threshold = total / 2;
    if over > threshold {
        CalibrationDiagnosis::OverConfident
    } else if under > threshold {
        CalibrationDiagnosis::UnderConfident
    } else {
        CalibrationDiagnosis::WellCalibrated
    }
}

pub fn calibration_report(picks: &[GradedPick]) -> CalibrationReport {
    let points = decided(picks);

    let mut brier_by_wager = BTreeMap::new();
    for wager in WagerType::ALL {
        let subset: Vec<&(f64, bool, WagerType)> =
            points.iter().filter(|(_, _, w)| w == wager).collect();
        if !subset.is_empty() {
            brier_by_wager.insert(*wager, brier(subset));
        }
    }

    let curve = curve(&points);
    CalibrationReport {
        total_picks: points.len(),
        overall_brier: brier(&points),
        brier_by_wager,
        diagnosis: diagnose(points.len(), &curve),
        curve,
    }
}
