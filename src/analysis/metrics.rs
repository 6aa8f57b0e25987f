// Per-keyword metric extraction from an interest table and related queries.
//
// Statistics never fail: a keyword missing from the table gets zeroes, and
// a keyword missing from the related map gets zero counts.

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::trends::models::{RelatedQueries, Table};

/// Series length at which momentum switches to the midpoint split
/// (two ~6-month halves of weekly data).
pub const MIDPOINT_SPLIT_MIN_PERIODS: usize = 26;

/// Percentile of the full series a recent maximum must beat to count as a peak.
const RECENT_PEAK_QUANTILE: f64 = 0.75;

/// Immutable snapshot of one keyword over one analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMetrics {
    pub keyword: String,
    pub avg_interest: f64,
    pub max_interest: f64,
    pub min_interest: f64,
    /// Sample standard deviation of the interest series
    pub volatility: f64,
    /// Relative change of the recent sub-window mean over the prior one
    pub momentum: f64,
    pub breakout_queries_count: u32,
    pub related_queries_count: u32,
    pub rising_queries_count: u32,
    /// Whether the recent window's maximum beats the series' 75th percentile
    pub recent_peak: bool,
    pub recent_peak_value: f64,
}

impl KeywordMetrics {
    /// All-zero metrics for a keyword with no data.
    pub fn empty(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            avg_interest: 0.0,
            max_interest: 0.0,
            min_interest: 0.0,
            volatility: 0.0,
            momentum: 0.0,
            breakout_queries_count: 0,
            related_queries_count: 0,
            rising_queries_count: 0,
            recent_peak: false,
            recent_peak_value: 0.0,
        }
    }
}

/// Extract metrics for `keyword` from its interest column and related queries.
pub fn extract_metrics(
    keyword: &str,
    interest: &Table,
    related: &RelatedQueries,
    thresholds: &Thresholds,
) -> KeywordMetrics {
    let mut metrics = KeywordMetrics::empty(keyword);

    if let Some(series) = interest.column(keyword).filter(|s| !s.is_empty()) {
        metrics.avg_interest = mean(series);
        metrics.max_interest = series.iter().copied().fold(f64::MIN, f64::max);
        metrics.min_interest = series.iter().copied().fold(f64::MAX, f64::min);
        metrics.volatility = sample_std(series);
        metrics.momentum = momentum(series);

        if let Some(peak) = recent_peak(series, thresholds.recent_peak_window) {
            metrics.recent_peak = peak.0;
            metrics.recent_peak_value = peak.1;
        }
    }

    if let Some(lists) = related.get(keyword) {
        metrics.related_queries_count = lists.top.len() as u32;
        metrics.rising_queries_count = lists.rising.len() as u32;
        metrics.breakout_queries_count = lists.rising.iter().filter(|q| q.breakout).count() as u32;
    }

    metrics
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator); 0.0 below two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// Quantile with linear interpolation between closest ranks; 0.0 when empty.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Signed relative change between a recent and a prior sub-window mean.
///
/// With at least `MIDPOINT_SPLIT_MIN_PERIODS` observations the series is
/// split at its midpoint. Shorter series compare the last third (rounded
/// up) against everything before it. The prior mean is floored at 1.0 in
/// the denominator, so the result stays bounded near zero interest.
pub fn momentum(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 0.0;
    }

    let split = if n >= MIDPOINT_SPLIT_MIN_PERIODS {
        n / 2
    } else {
        n - n.div_ceil(3)
    };

    let (prior, recent) = series.split_at(split);
    let prior_mean = mean(prior);
    (mean(recent) - prior_mean) / prior_mean.max(1.0)
}

/// `(peaked, recent_max)` over the last `window` observations, or `None`
/// when the series is shorter than the window.
pub fn recent_peak(series: &[f64], window: usize) -> Option<(bool, f64)> {
    if window == 0 || series.len() < window {
        return None;
    }
    let recent_max = series[series.len() - window..]
        .iter()
        .copied()
        .fold(f64::MIN, f64::max);
    Some((recent_max > quantile(series, RECENT_PEAK_QUANTILE), recent_max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-12);
        // Sample std of this classic set is sqrt(32/7)
        assert!((sample_std(&values) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_std_of_single_value_is_zero() {
        assert_eq!(sample_std(&[42.0]), 0.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        // pos = 0.75 * 3 = 2.25 → 3 + 0.25 * (4 - 3)
        assert!((quantile(&values, 0.75) - 3.25).abs() < 1e-12);
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
    }

    #[test]
    fn test_quantile_ignores_input_order() {
        assert_eq!(quantile(&[4.0, 1.0, 3.0, 2.0], 0.5), quantile(&[1.0, 2.0, 3.0, 4.0], 0.5));
    }

    #[test]
    fn test_momentum_midpoint_split() {
        // 26 points: first 13 at 10, last 13 at 20 → (20 - 10) / 10
        let mut series = vec![10.0; 13];
        series.extend(vec![20.0; 13]);
        assert!((momentum(&series) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_momentum_short_series_uses_last_third() {
        // 9 points: prior = first 6 at 10, recent = last 3 at 5 → -0.5
        let mut series = vec![10.0; 6];
        series.extend(vec![5.0; 3]);
        assert!((momentum(&series) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_momentum_short_series_rounds_third_up() {
        // 4 points: recent = last 2 (ceil(4/3)), prior = first 2
        let series = [10.0, 10.0, 30.0, 30.0];
        assert!((momentum(&series) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_momentum_floors_zero_prior() {
        let mut series = vec![0.0; 13];
        series.extend(vec![3.0; 13]);
        let m = momentum(&series);
        assert!(m.is_finite());
        assert!((m - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_momentum_degenerate_lengths() {
        assert_eq!(momentum(&[]), 0.0);
        assert_eq!(momentum(&[50.0]), 0.0);
    }

    #[test]
    fn test_recent_peak_requires_window() {
        assert_eq!(recent_peak(&[1.0; 12], 13), None);
    }

    #[test]
    fn test_recent_peak_detects_late_spike() {
        let mut series = vec![10.0; 20];
        series.push(90.0);
        assert_eq!(recent_peak(&series, 13), Some((true, 90.0)));
    }

    #[test]
    fn test_flat_series_has_no_peak() {
        assert_eq!(recent_peak(&[10.0; 20], 13), Some((false, 10.0)));
    }

    #[test]
    fn test_empty_metrics_are_zero() {
        let m = KeywordMetrics::empty("nothing");
        assert_eq!(m.avg_interest, 0.0);
        assert_eq!(m.related_queries_count, 0);
        assert!(!m.recent_peak);
    }
}
