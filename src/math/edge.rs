//! Edge attribution.
//!
//! Splits a predicted deviation into its structural and price-driven
//! parts. An edge that is mostly price movement is the market talking,
//! not the model; such picks are rejected.

use serde::{Deserialize, Serialize};

/// Totals smaller than this are treated as "no net edge".
const ZERO_DELTA_EPSILON: f64 = 1e-9;

/// Default upper bound on the structural share.
pub const DEFAULT_MAX_STRUCTURAL_PCT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttribution {
    pub total_delta: f64,
    pub structural_delta: f64,
    pub price_delta: f64,
    /// |structural| / |total|, in [0, 1].
    pub structural_share: f64,
    /// |price| / |total|, in [0, 1].
    pub price_share: f64,
    pub passes: bool,
}

/// Attribute `total_delta` to structural vs. price signals.
///
/// The share is clamped to [0, 1]: when the two parts disagree in sign the
/// structural part can exceed the net total. A zero total yields a 0%
/// share rather than an error.
pub fn calculate_edge_attribution(
    total_delta: f64,
    structural_delta: f64,
    price_delta: f64,
    min_structural_pct: f64,
    max_structural_pct: f64,
) -> EdgeAttribution {
    let total_abs = total_delta.abs();
    let (structural_share, price_share) = if total_abs < ZERO_DELTA_EPSILON {
        (0.0, 0.0)
    } else {
        (
            (structural_delta.abs() / total_abs).min(1.0),
            (price_delta.abs() / total_abs).min(1.0),
        )
    };

    let passes = structural_share >= min_structural_pct && structural_share <= max_structural_pct;

    EdgeAttribution {
        total_delta,
        structural_delta,
        price_delta,
        structural_share,
        price_share,
        passes,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pure_structural_edge_passes() {
        let a = calculate_edge_attribution(4.0, 4.0, 0.0, 0.6, DEFAULT_MAX_STRUCTURAL_PCT);
        assert_eq!(a.structural_share, 1.0);
        assert_eq!(a.price_share, 0.0);
        assert!(a.passes);
    }

    #[test]
    fn test_price_driven_edge_fails() {
        // 1 point of model reasoning, 3 points of line movement.
        let a = calculate_edge_attribution(4.0, 1.0, 3.0, 0.6, DEFAULT_MAX_STRUCTURAL_PCT);
        assert!((a.structural_share - 0.25).abs() < 1e-12);
        assert!((a.price_share - 0.75).abs() < 1e-12);
        assert!(!a.passes);
    }

    #[test]
    fn test_zero_total_is_zero_share() {
        let a = calculate_edge_attribution(0.0, 0.0, 0.0, 0.6, 1.0);
        assert_eq!(a.structural_share, 0.0);
        assert!(!a.passes);

        // Offsetting parts cancel to no net edge.
        let b = calculate_edge_attribution(0.0, 2.0, -2.0, 0.0, 1.0);
        assert_eq!(b.structural_share, 0.0);
        assert!(b.passes);
    }

    #[test]
    fn test_share_clamped_when_parts_disagree() {
        let a = calculate_edge_attribution(3.0, 5.0, -2.0, 0.6, 1.0);
        assert_eq!(a.structural_share, 1.0);
        assert!(a.passes);
    }

    #[test]
    fn test_upper_bound_respected() {
        let a = calculate_edge_attribution(2.0, 2.0, 0.0, 0.5, 0.9);
        assert!(!a.passes);
    }

    #[test]
    fn test_sign_of_total_ignored() {
        let a = calculate_edge_attribution(-4.0, -3.0, -1.0, 0.6, 1.0);
        assert!((a.structural_share - 0.75).abs() < 1e-12);
        assert!(a.passes);
    }
}
