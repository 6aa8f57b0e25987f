// Scripted in-memory TrendsSource shared by the integration tests.
//
// Series and related data are configured per keyword. Failures are queued
// and handed out one per call before any data is returned, so a test can
// script "N failures, then success". Every endpoint counts its calls.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use trendscope::cache::DiskCache;
use trendscope::trends::error::FetchError;
use trendscope::trends::fetcher::CachedFetcher;
use trendscope::trends::models::{
    QueryParams, RealtimeTrend, RelatedQuery, RelatedTopic, Table, TrendingTerm, DATE_INDEX,
    REGION_INDEX,
};
use trendscope::trends::rate_limit::{RequestPacer, RetryPolicy};
use trendscope::trends::source::{RawRelated, RawRelatedMap, TrendsSource};

#[derive(Default)]
pub struct MockSource {
    series: BTreeMap<String, Vec<f64>>,
    related: BTreeMap<String, Option<RawRelated<RelatedQuery>>>,
    trending: Vec<TrendingTerm>,
    /// Keywords whose interest request always fails with a non-transient error
    broken: Vec<String>,
    regions_fail: bool,
    failures: Mutex<VecDeque<FetchError>>,
    pub interest_calls: AtomicUsize,
    pub related_calls: AtomicUsize,
    pub region_calls: AtomicUsize,
    pub trending_calls: AtomicUsize,
    pub topic_calls: AtomicUsize,
    pub realtime_calls: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, keyword: &str, values: Vec<f64>) -> Self {
        self.series.insert(keyword.to_string(), values);
        self
    }

    pub fn with_related(
        mut self,
        keyword: &str,
        related: Option<RawRelated<RelatedQuery>>,
    ) -> Self {
        self.related.insert(keyword.to_string(), related);
        self
    }

    pub fn with_trending(mut self, terms: &[&str]) -> Self {
        self.trending = terms
            .iter()
            .map(|t| TrendingTerm {
                query: t.to_string(),
                traffic: Some("100K+".to_string()),
            })
            .collect();
        self
    }

    pub fn with_broken_keyword(mut self, keyword: &str) -> Self {
        self.broken.push(keyword.to_string());
        self
    }

    pub fn with_failing_regions(mut self) -> Self {
        self.regions_fail = true;
        self
    }

    /// Queue errors returned by the next calls, in order, on any endpoint.
    pub fn fail_next(self, errors: Vec<FetchError>) -> Self {
        self.failures
            .lock()
            .expect("failure queue poisoned")
            .extend(errors);
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn next_failure(&self) -> Option<FetchError> {
        self.failures
            .lock()
            .expect("failure queue poisoned")
            .pop_front()
    }

    fn rows(&self, keywords: &[String]) -> usize {
        keywords
            .iter()
            .filter_map(|k| self.series.get(k))
            .map(Vec::len)
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TrendsSource for MockSource {
    async fn interest_over_time(
        &self,
        keywords: &[String],
        _params: &QueryParams,
    ) -> Result<Table, FetchError> {
        self.interest_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_failure() {
            return Err(err);
        }
        if keywords.iter().any(|k| self.broken.contains(k)) {
            return Err(FetchError::Upstream {
                status: 400,
                body: "bad keyword".to_string(),
            });
        }

        let rows = self.rows(keywords);
        let mut table = Table::new(DATE_INDEX);
        table.index = (0..rows).map(|i| format!("2024-01-{:02}", i + 1)).collect();
        table.partial = (0..rows).map(|i| i + 1 == rows).collect();
        for kw in keywords {
            if let Some(values) = self.series.get(kw) {
                table.columns.insert(kw.clone(), values.clone());
            }
        }
        Ok(table)
    }

    async fn related_queries(
        &self,
        keywords: &[String],
        _params: &QueryParams,
    ) -> Result<RawRelatedMap<RelatedQuery>, FetchError> {
        self.related_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_failure() {
            return Err(err);
        }
        Ok(keywords
            .iter()
            .filter_map(|k| self.related.get(k).map(|r| (k.clone(), r.clone())))
            .collect())
    }

    async fn related_topics(
        &self,
        _keywords: &[String],
        _params: &QueryParams,
    ) -> Result<RawRelatedMap<RelatedTopic>, FetchError> {
        self.topic_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_failure() {
            return Err(err);
        }
        Ok(BTreeMap::new())
    }

    async fn interest_by_region(
        &self,
        keywords: &[String],
        _params: &QueryParams,
        _resolution: &str,
    ) -> Result<Table, FetchError> {
        self.region_calls.fetch_add(1, Ordering::SeqCst);
        if self.regions_fail {
            return Err(FetchError::Upstream {
                status: 500,
                body: "no regional data".to_string(),
            });
        }
        let mut table = Table::new(REGION_INDEX);
        table.index = vec!["California".to_string(), "Texas".to_string()];
        for kw in keywords {
            table.columns.insert(kw.clone(), vec![100.0, 42.0]);
        }
        Ok(table)
    }

    async fn trending_searches(&self, _geo: &str) -> Result<Vec<TrendingTerm>, FetchError> {
        self.trending_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_failure() {
            return Err(err);
        }
        Ok(self.trending.clone())
    }

    async fn realtime_trends(
        &self,
        geo: &str,
        category: &str,
    ) -> Result<Vec<RealtimeTrend>, FetchError> {
        self.realtime_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_failure() {
            return Err(err);
        }
        Ok(vec![RealtimeTrend {
            title: format!("{geo} story"),
            entity_names: vec![category.to_string()],
        }])
    }
}

/// Retry policy with short waits: 1s, 2s, 4s, ... capped at 10s.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base: Duration::from_secs(1),
        min: Duration::from_secs(1),
        max: Duration::from_secs(10),
        exponential_base: 2,
    }
}

/// A fetcher over `source` caching into `dir`, with no pacing delay.
pub fn fetcher(source: MockSource, dir: &Path, max_attempts: u32) -> CachedFetcher<MockSource> {
    CachedFetcher::with_parts(
        source,
        DiskCache::new(dir, Duration::from_secs(86_400)),
        RequestPacer::new(Duration::ZERO),
        fast_policy(max_attempts),
    )
}

pub fn kws(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|k| k.to_string()).collect()
}

pub fn query(keyword: &str, formatted: &str, breakout: bool) -> RelatedQuery {
    RelatedQuery {
        query: keyword.to_string(),
        value: 100,
        formatted_value: formatted.to_string(),
        breakout,
    }
}

pub fn params() -> QueryParams {
    QueryParams::new("today 12-m", "US", 0)
}
