// Upstream data source trait: the seam between fetching policy and transport.
//
// `CachedFetcher` owns caching, pacing and retries; a `TrendsSource` only
// knows how to ask the upstream for one payload. The HTTP client implements
// it for the real service, tests implement it with scripted responses.
//
// Pacing and retries apply per trait call. A single call may cover several
// HTTP requests (the client's explore step plus one widget-data request per
// widget); those are issued back to back and retried together.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::error::FetchError;
use super::models::{
    QueryParams, RealtimeTrend, RelatedLists, RelatedQuery, RelatedTopic, Table, TrendingTerm,
};

/// Related lists as the upstream hands them over: either side may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRelated<T> {
    pub top: Option<Vec<T>>,
    pub rising: Option<Vec<T>>,
}

impl<T> Default for RawRelated<T> {
    fn default() -> Self {
        Self {
            top: None,
            rising: None,
        }
    }
}

/// Per-keyword related payload; `None` means the upstream had no data at all.
pub type RawRelatedMap<T> = BTreeMap<String, Option<RawRelated<T>>>;

#[async_trait]
pub trait TrendsSource: Send + Sync {
    /// Time-indexed interest, one column per keyword.
    async fn interest_over_time(
        &self,
        keywords: &[String],
        params: &QueryParams,
    ) -> Result<Table, FetchError>;

    async fn related_queries(
        &self,
        keywords: &[String],
        params: &QueryParams,
    ) -> Result<RawRelatedMap<RelatedQuery>, FetchError>;

    async fn related_topics(
        &self,
        keywords: &[String],
        params: &QueryParams,
    ) -> Result<RawRelatedMap<RelatedTopic>, FetchError>;

    /// Region-indexed interest, one column per keyword.
    async fn interest_by_region(
        &self,
        keywords: &[String],
        params: &QueryParams,
        resolution: &str,
    ) -> Result<Table, FetchError>;

    async fn trending_searches(&self, geo: &str) -> Result<Vec<TrendingTerm>, FetchError>;

    async fn realtime_trends(
        &self,
        geo: &str,
        category: &str,
    ) -> Result<Vec<RealtimeTrend>, FetchError>;
}

/// Replace absent keywords and absent lists with explicit empty lists.
///
/// Every requested keyword gets an entry, so metric extraction never has to
/// tell "no related data" apart from "not in the response".
pub fn normalize_related<T>(
    keywords: &[String],
    raw: RawRelatedMap<T>,
) -> BTreeMap<String, RelatedLists<T>> {
    let mut normalized: BTreeMap<String, RelatedLists<T>> = raw
        .into_iter()
        .map(|(keyword, lists)| {
            let lists = lists.unwrap_or_default();
            (
                keyword,
                RelatedLists {
                    top: lists.top.unwrap_or_default(),
                    rising: lists.rising.unwrap_or_default(),
                },
            )
        })
        .collect();

    for keyword in keywords {
        normalized.entry(keyword.clone()).or_default();
    }

    normalized
}
