//! Game models: score prediction and outcome variance.
//!
//! Both are pure functions of a `GameInput`; neither depends on the
//! market or on the factor list.

pub mod score;
pub mod variance;

pub use score::{predict_pace, predict_score};
pub use variance::{estimate_sigma_spread, estimate_sigma_total, VarianceContext};
