// Reference benchmark: the baseline that similarity scores compare against.
//
// Built once from the reference keywords that actually have metrics. An
// empty intersection produces no benchmark at all, so a comparison can never
// run against an undefined baseline.

use std::collections::BTreeMap;

use serde::Serialize;

use super::metrics::{mean, KeywordMetrics};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Benchmark {
    /// Reference keywords that had metrics, with those metrics.
    pub members: BTreeMap<String, KeywordMetrics>,
    pub avg_interest: f64,
    pub momentum: f64,
    /// Mean related-query count across the reference set.
    pub breadth: f64,
}

impl Benchmark {
    /// Build a benchmark from the reference keywords present in `metrics`.
    ///
    /// Returns `None` when none of the reference keywords have metrics.
    pub fn from_reference(
        reference_keywords: &[String],
        metrics: &BTreeMap<String, KeywordMetrics>,
    ) -> Option<Self> {
        let members: BTreeMap<String, KeywordMetrics> = reference_keywords
            .iter()
            .filter_map(|kw| metrics.get(kw).map(|m| (kw.clone(), m.clone())))
            .collect();

        if members.is_empty() {
            return None;
        }

        let interests: Vec<f64> = members.values().map(|m| m.avg_interest).collect();
        let momentums: Vec<f64> = members.values().map(|m| m.momentum).collect();
        let breadths: Vec<f64> = members
            .values()
            .map(|m| m.related_queries_count as f64)
            .collect();

        Some(Self {
            avg_interest: mean(&interests),
            momentum: mean(&momentums),
            breadth: mean(&breadths),
            members,
        })
    }

    /// Treat one keyword's metrics as a single-member benchmark.
    pub fn from_metrics(metrics: &KeywordMetrics) -> Self {
        let mut members = BTreeMap::new();
        members.insert(metrics.keyword.clone(), metrics.clone());
        Self {
            avg_interest: metrics.avg_interest,
            momentum: metrics.momentum,
            breadth: metrics.related_queries_count as f64,
            members,
        }
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(keyword: &str, avg: f64, momentum: f64, breadth: u32) -> KeywordMetrics {
        KeywordMetrics {
            avg_interest: avg,
            momentum,
            related_queries_count: breadth,
            ..KeywordMetrics::empty(keyword)
        }
    }

    #[test]
    fn test_means_over_reference_set() {
        let mut all = BTreeMap::new();
        all.insert("a".to_string(), metrics("a", 40.0, 0.2, 10));
        all.insert("b".to_string(), metrics("b", 60.0, 0.4, 20));
        all.insert("c".to_string(), metrics("c", 99.0, 9.0, 99));

        let bench = Benchmark::from_reference(&["a".into(), "b".into()], &all).unwrap();
        assert!((bench.avg_interest - 50.0).abs() < 1e-12);
        assert!((bench.momentum - 0.3).abs() < 1e-12);
        assert!((bench.breadth - 15.0).abs() < 1e-12);
        assert_eq!(bench.keywords().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_reference_keywords_without_metrics_are_skipped() {
        let mut all = BTreeMap::new();
        all.insert("a".to_string(), metrics("a", 40.0, 0.0, 4));

        let bench = Benchmark::from_reference(&["a".into(), "ghost".into()], &all).unwrap();
        assert_eq!(bench.members.len(), 1);
        assert!((bench.avg_interest - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_intersection_yields_no_benchmark() {
        let all = BTreeMap::new();
        assert!(Benchmark::from_reference(&["a".into()], &all).is_none());
        assert!(Benchmark::from_reference(&[], &all).is_none());
    }
}
