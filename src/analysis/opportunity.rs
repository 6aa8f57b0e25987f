// Standalone opportunity score, no reference benchmark needed.
//
// Five components, each on a 0-100 scale before weighting:
//
//   interest  = 0 below min_avg_interest, else avg / interest_ceiling * 100
//   momentum  = (momentum + 1) * 25          (-1 → 0, 1 → 50, 3 → 100)
//   breakout  = breakout_count / min_breakout_queries * 50
//   breadth   = related_count / min_related_queries * 50
//   recency   = recency_bonus when a recent peak was seen, else 0
//
// Meeting a count threshold exactly earns half the component; twice the
// threshold saturates it. The weighted sum is the final 0-100 score.

use std::cmp::Ordering;

use serde::Serialize;

use super::metrics::KeywordMetrics;
use crate::config::{OpportunityWeights, Thresholds};

/// Per-component scores (0-100 each, unweighted) plus the weighted total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityBreakdown {
    pub interest: f64,
    pub momentum: f64,
    pub breakout: f64,
    pub breadth: f64,
    pub recency: f64,
    pub total: f64,
}

/// A scored keyword in a discovery ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub keyword: String,
    pub score: f64,
    pub metrics: KeywordMetrics,
}

pub fn opportunity_breakdown(
    metrics: &KeywordMetrics,
    weights: &OpportunityWeights,
    thresholds: &Thresholds,
) -> OpportunityBreakdown {
    let interest = if metrics.avg_interest < thresholds.min_avg_interest {
        0.0
    } else {
        clamp_component(metrics.avg_interest / thresholds.interest_ceiling.max(f64::EPSILON) * 100.0)
    };

    let momentum = clamp_component((metrics.momentum + 1.0) * 25.0);
    let breakout = count_component(metrics.breakout_queries_count, thresholds.min_breakout_queries);
    let breadth = count_component(metrics.related_queries_count, thresholds.min_related_queries);
    let recency = if metrics.recent_peak {
        clamp_component(thresholds.recency_bonus)
    } else {
        0.0
    };

    let total = interest * weights.avg_interest
        + momentum * weights.momentum
        + breakout * weights.breakout_queries
        + breadth * weights.breadth
        + recency * weights.recency;

    OpportunityBreakdown {
        interest,
        momentum,
        breakout,
        breadth,
        recency,
        total: clamp_component(total),
    }
}

/// Weighted opportunity score in [0, 100].
pub fn opportunity_score(
    metrics: &KeywordMetrics,
    weights: &OpportunityWeights,
    thresholds: &Thresholds,
) -> f64 {
    opportunity_breakdown(metrics, weights, thresholds).total
}

/// Score every keyword, keep those at or above `min_discovery_score`, and
/// sort by score descending. Equal scores order by keyword ascending.
pub fn rank_opportunities<'a, I>(
    metrics: I,
    weights: &OpportunityWeights,
    thresholds: &Thresholds,
) -> Vec<Opportunity>
where
    I: IntoIterator<Item = &'a KeywordMetrics>,
{
    let mut ranked: Vec<Opportunity> = metrics
        .into_iter()
        .map(|m| Opportunity {
            keyword: m.keyword.clone(),
            score: opportunity_score(m, weights, thresholds),
            metrics: m.clone(),
        })
        .filter(|o| o.score >= thresholds.min_discovery_score)
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    ranked
}

fn count_component(count: u32, threshold: u32) -> f64 {
    if threshold == 0 {
        return if count > 0 { 100.0 } else { 0.0 };
    }
    clamp_component(count as f64 / threshold as f64 * 50.0)
}

fn clamp_component(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
