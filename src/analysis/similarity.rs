// Similarity of one keyword to a reference benchmark.
//
// Three signals (average interest, momentum, breadth) are each turned into
// a 0-100 closeness score against the benchmark mean. The scale for each
// signal is the larger magnitude of the two values, with a small floor, so
// the same absolute gap matters more between small values than between
// large ones.
//
// The weighted closeness is then multiplied by a demand ratio:
//
//   min(candidate_interest, reference_interest) / max(candidate, reference, 1.0)
//
// so a keyword with a fraction of the reference's demand cannot look
// "similar" on momentum and breadth alone.

use serde::Serialize;

use super::benchmark::Benchmark;
use super::metrics::KeywordMetrics;

/// Floors for the per-signal normalizers.
pub const INTEREST_SCALE_FLOOR: f64 = 1.0;
pub const MOMENTUM_SCALE_FLOOR: f64 = 0.5;
pub const BREADTH_SCALE_FLOOR: f64 = 1.0;

/// Weights for combining the three closeness scores.
pub const INTEREST_WEIGHT: f64 = 0.35;
pub const MOMENTUM_WEIGHT: f64 = 0.35;
pub const BREADTH_WEIGHT: f64 = 0.30;

/// Result of comparing one keyword to the benchmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonScore {
    pub keyword: String,
    /// 0-100, after the demand-ratio penalty
    pub similarity_score: f64,
    pub avg_interest_gap: f64,
    pub momentum_gap: f64,
    pub breadth_gap: f64,
    pub metrics: KeywordMetrics,
}

/// Closeness of `candidate` to `reference` on a 0-100 scale.
pub fn closeness(candidate: f64, reference: f64, floor: f64) -> f64 {
    let gap = (candidate - reference).abs();
    let scale = candidate.abs().max(reference.abs()).max(floor);
    (100.0 - gap / scale * 100.0).clamp(0.0, 100.0)
}

/// Demand-ratio penalty factor in [0, 1]. Symmetric in its arguments.
pub fn demand_ratio(candidate_interest: f64, reference_interest: f64) -> f64 {
    let low = candidate_interest.min(reference_interest).max(0.0);
    let high = candidate_interest.max(reference_interest).max(1.0);
    low / high
}

/// Score `metrics` against `benchmark`.
pub fn compare(keyword: &str, metrics: &KeywordMetrics, benchmark: &Benchmark) -> ComparisonScore {
    let breadth = metrics.related_queries_count as f64;

    let interest_score = closeness(
        metrics.avg_interest,
        benchmark.avg_interest,
        INTEREST_SCALE_FLOOR,
    );
    let momentum_score = closeness(metrics.momentum, benchmark.momentum, MOMENTUM_SCALE_FLOOR);
    let breadth_score = closeness(breadth, benchmark.breadth, BREADTH_SCALE_FLOOR);

    let raw = interest_score * INTEREST_WEIGHT
        + momentum_score * MOMENTUM_WEIGHT
        + breadth_score * BREADTH_WEIGHT;

    let penalized = raw * demand_ratio(metrics.avg_interest, benchmark.avg_interest);
    let similarity_score = if penalized.is_finite() {
        penalized.clamp(0.0, 100.0)
    } else {
        0.0
    };

    ComparisonScore {
        keyword: keyword.to_string(),
        similarity_score,
        avg_interest_gap: (metrics.avg_interest - benchmark.avg_interest).abs(),
        momentum_gap: (metrics.momentum - benchmark.momentum).abs(),
        breadth_gap: (breadth - benchmark.breadth).abs(),
        metrics: metrics.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_values_are_fully_close() {
        assert_eq!(closeness(42.0, 42.0, 1.0), 100.0);
        assert_eq!(closeness(0.0, 0.0, 1.0), 100.0);
    }

    #[test]
    fn test_closeness_scales_with_magnitude() {
        // Gap of 10 matters less between 90 and 100 than between 10 and 20
        assert!(closeness(90.0, 100.0, 1.0) > closeness(10.0, 20.0, 1.0));
        assert!((closeness(90.0, 100.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((closeness(10.0, 20.0, 1.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_closeness_clamps_opposite_signs() {
        assert_eq!(closeness(-1.0, 1.0, 0.5), 0.0);
    }

    #[test]
    fn test_floor_applies_near_zero() {
        // 0.1 vs 0.0: scale is the 0.5 floor, not 0.1
        assert!((closeness(0.1, 0.0, 0.5) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_demand_ratio_equal_interest() {
        assert_eq!(demand_ratio(50.0, 50.0), 1.0);
    }

    #[test]
    fn test_demand_ratio_is_symmetric() {
        assert_eq!(demand_ratio(10.0, 80.0), demand_ratio(80.0, 10.0));
        assert!((demand_ratio(10.0, 80.0) - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_demand_ratio_zero_demand() {
        assert_eq!(demand_ratio(0.0, 0.0), 0.0);
        assert_eq!(demand_ratio(0.0, 50.0), 0.0);
    }
}
