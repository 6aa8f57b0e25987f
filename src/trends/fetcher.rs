// CachedFetcher: cache, pacing and retry around a TrendsSource.
//
// Every endpoint follows the same sequence:
// 1. Derive the cache key from the sorted keyword set and query parameters
// 2. Return the cached payload if it is fresh (no network access)
// 3. Otherwise pace, call the source under the retry policy, normalize
// 4. Persist the normalized payload, then return it
//
// The fetcher does not split keyword lists. Staying under the upstream's
// per-request keyword ceiling is the caller's job (see pipeline::batch).

use tracing::info;

use super::error::FetchError;
use super::models::{
    QueryParams, RealtimeTrend, RelatedQueries, RelatedTopics, Table, TrendingTerm,
};
use super::rate_limit::{with_retry, RequestPacer, RetryPolicy};
use super::source::{normalize_related, TrendsSource};
use crate::cache::{cache_key, DiskCache};
use crate::config::Config;

pub struct CachedFetcher<S> {
    source: S,
    cache: DiskCache,
    pacer: RequestPacer,
    retry: RetryPolicy,
}

impl<S: TrendsSource> CachedFetcher<S> {
    /// Build a fetcher with cache, pacing and retry settings from `config`.
    pub fn new(source: S, config: &Config) -> Self {
        Self::with_parts(
            source,
            DiskCache::new(&config.cache_dir, config.cache_ttl),
            RequestPacer::new(config.backoff),
            RetryPolicy::from_settings(&config.retry),
        )
    }

    pub fn with_parts(
        source: S,
        cache: DiskCache,
        pacer: RequestPacer,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            cache,
            pacer,
            retry,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &DiskCache {
        &self.cache
    }

    /// Interest over time, one column per keyword.
    pub async fn interest_over_time(
        &self,
        keywords: &[String],
        params: &QueryParams,
    ) -> Result<Table, FetchError> {
        let key = cache_key("interest_over_time", keywords, &params.key_parts());

        self.cache
            .load_or_fetch(&key, || async {
                info!(keywords = ?keywords, "Fetching interest_over_time");
                let table = with_retry(&self.pacer, &self.retry, || {
                    self.source.interest_over_time(keywords, params)
                })
                .await?;
                normalize_table(&table)
            })
            .await
    }

    /// Related queries with explicit `top`/`rising` lists for every keyword.
    pub async fn related_queries(
        &self,
        keywords: &[String],
        params: &QueryParams,
    ) -> Result<RelatedQueries, FetchError> {
        let key = cache_key("related_queries", keywords, &params.key_parts());

        self.cache
            .load_or_fetch(&key, || async {
                info!(keywords = ?keywords, "Fetching related_queries");
                let raw = with_retry(&self.pacer, &self.retry, || {
                    self.source.related_queries(keywords, params)
                })
                .await?;
                Ok(normalize_related(keywords, raw))
            })
            .await
    }

    /// Related topics with explicit `top`/`rising` lists for every keyword.
    pub async fn related_topics(
        &self,
        keywords: &[String],
        params: &QueryParams,
    ) -> Result<RelatedTopics, FetchError> {
        let key = cache_key("related_topics", keywords, &params.key_parts());

        self.cache
            .load_or_fetch(&key, || async {
                info!(keywords = ?keywords, "Fetching related_topics");
                let raw = with_retry(&self.pacer, &self.retry, || {
                    self.source.related_topics(keywords, params)
                })
                .await?;
                Ok(normalize_related(keywords, raw))
            })
            .await
    }

    /// Interest by region at the given resolution (e.g. "COUNTRY", "REGION").
    pub async fn interest_by_region(
        &self,
        keywords: &[String],
        params: &QueryParams,
        resolution: &str,
    ) -> Result<Table, FetchError> {
        let mut parts = params.key_parts();
        parts.push(resolution.to_string());
        let key = cache_key("interest_by_region", keywords, &parts);

        self.cache
            .load_or_fetch(&key, || async {
                info!(keywords = ?keywords, resolution = resolution, "Fetching interest_by_region");
                let table = with_retry(&self.pacer, &self.retry, || {
                    self.source.interest_by_region(keywords, params, resolution)
                })
                .await?;
                normalize_table(&table)
            })
            .await
    }

    /// Today's trending searches for a region.
    pub async fn trending_searches(&self, geo: &str) -> Result<Vec<TrendingTerm>, FetchError> {
        let key = cache_key("trending_searches", &[], &[geo]);

        self.cache
            .load_or_fetch(&key, || async {
                info!(geo = geo, "Fetching trending_searches");
                with_retry(&self.pacer, &self.retry, || {
                    self.source.trending_searches(geo)
                })
                .await
            })
            .await
    }

    /// Realtime trending stories for a region and category ("all", "b", "e", ...).
    pub async fn realtime_trends(
        &self,
        geo: &str,
        category: &str,
    ) -> Result<Vec<RealtimeTrend>, FetchError> {
        let key = cache_key("realtime_trends", &[], &[geo, category]);

        self.cache
            .load_or_fetch(&key, || async {
                info!(geo = geo, category = category, "Fetching realtime_trends");
                with_retry(&self.pacer, &self.retry, || {
                    self.source.realtime_trends(geo, category)
                })
                .await
            })
            .await
    }
}

fn normalize_table(table: &Table) -> Result<Table, FetchError> {
    table
        .normalized()
        .map_err(|e| FetchError::Decode(e.to_string()))
}
