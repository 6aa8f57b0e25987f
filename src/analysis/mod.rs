// Keyword analysis: metrics, reference benchmark, similarity and opportunity.
//
// KeywordAnalyzer holds the scoring policy (weights and thresholds) and the
// current reference benchmark. It never touches the network or the cache;
// it only consumes tables and related-query maps produced by the fetcher.

pub mod benchmark;
pub mod error;
pub mod metrics;
pub mod opportunity;
pub mod similarity;

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::config::{Config, OpportunityWeights, Thresholds};
use crate::trends::models::{RelatedQueries, Table};

pub use benchmark::Benchmark;
pub use error::AnalyzerError;
pub use metrics::KeywordMetrics;
pub use opportunity::{Opportunity, OpportunityBreakdown};
pub use similarity::ComparisonScore;

pub struct KeywordAnalyzer {
    weights: OpportunityWeights,
    thresholds: Thresholds,
    benchmark: Option<Benchmark>,
}

impl KeywordAnalyzer {
    /// Analyzer using the scoring policy from `config`.
    ///
    /// `Config::validate()` already guarantees the weights sum to 1.0.
    pub fn new(config: &Config) -> Self {
        Self {
            weights: config.weights.clone(),
            thresholds: config.thresholds.clone(),
            benchmark: None,
        }
    }

    /// Analyzer with an explicit policy. Rejects weights that do not sum to 1.0.
    pub fn with_policy(
        weights: OpportunityWeights,
        thresholds: Thresholds,
    ) -> Result<Self, AnalyzerError> {
        let sum = weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(AnalyzerError::InvalidWeights { sum });
        }
        Ok(Self {
            weights,
            thresholds,
            benchmark: None,
        })
    }

    pub fn extract_metrics(
        &self,
        keyword: &str,
        interest: &Table,
        related: &RelatedQueries,
    ) -> KeywordMetrics {
        metrics::extract_metrics(keyword, interest, related, &self.thresholds)
    }

    /// Establish the reference benchmark from the reference keywords that
    /// have metrics. Clears any previous benchmark when none do.
    pub fn set_reference_keywords(
        &mut self,
        reference_keywords: &[String],
        all_metrics: &BTreeMap<String, KeywordMetrics>,
    ) -> Option<&Benchmark> {
        self.benchmark = Benchmark::from_reference(reference_keywords, all_metrics);

        match &self.benchmark {
            Some(b) => info!(
                members = b.members.len(),
                avg_interest = b.avg_interest,
                momentum = b.momentum,
                breadth = b.breadth,
                "Reference benchmark established"
            ),
            None => warn!(
                requested = reference_keywords.len(),
                "No reference keyword has metrics, benchmark cleared"
            ),
        }
        self.benchmark.as_ref()
    }

    pub fn benchmark(&self) -> Option<&Benchmark> {
        self.benchmark.as_ref()
    }

    /// Similarity of `metrics` to the current benchmark.
    pub fn compare_to_reference(
        &self,
        keyword: &str,
        metrics: &KeywordMetrics,
    ) -> Result<ComparisonScore, AnalyzerError> {
        let benchmark = self
            .benchmark
            .as_ref()
            .ok_or(AnalyzerError::ReferenceNotSet)?;
        Ok(similarity::compare(keyword, metrics, benchmark))
    }

    pub fn get_opportunity_score(&self, metrics: &KeywordMetrics) -> f64 {
        opportunity::opportunity_score(metrics, &self.weights, &self.thresholds)
    }

    pub fn opportunity_breakdown(&self, metrics: &KeywordMetrics) -> OpportunityBreakdown {
        opportunity::opportunity_breakdown(metrics, &self.weights, &self.thresholds)
    }

    pub fn rank_opportunities<'a, I>(&self, metrics: I) -> Vec<Opportunity>
    where
        I: IntoIterator<Item = &'a KeywordMetrics>,
    {
        opportunity::rank_opportunities(metrics, &self.weights, &self.thresholds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_policy_rejects_bad_weights() {
        let weights = OpportunityWeights {
            recency: 0.9,
            ..OpportunityWeights::default()
        };
        let err = KeywordAnalyzer::with_policy(weights, Thresholds::default())
            .err()
            .unwrap();
        assert!(matches!(err, AnalyzerError::InvalidWeights { .. }));
    }

    #[test]
    fn test_compare_without_reference_fails() {
        let analyzer = KeywordAnalyzer::new(&Config::default());
        let err = analyzer
            .compare_to_reference("x", &KeywordMetrics::empty("x"))
            .unwrap_err();
        assert_eq!(err, AnalyzerError::ReferenceNotSet);
    }

    #[test]
    fn test_empty_reference_clears_benchmark() {
        let mut analyzer = KeywordAnalyzer::new(&Config::default());
        let mut all = BTreeMap::new();
        all.insert("a".to_string(), KeywordMetrics::empty("a"));

        assert!(analyzer.set_reference_keywords(&["a".into()], &all).is_some());
        assert!(analyzer.set_reference_keywords(&["ghost".into()], &all).is_none());
        assert!(analyzer.benchmark().is_none());
        assert!(analyzer
            .compare_to_reference("a", &KeywordMetrics::empty("a"))
            .is_err());
    }
}
