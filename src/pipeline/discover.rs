// Discovery flow: score today's trending searches for opportunity.

use anyhow::{bail, Result};
use tracing::info;

use super::batch::{dedup_keywords, fetch_keyword_data, KeywordDataset};
use crate::analysis::{KeywordAnalyzer, Opportunity};
use crate::trends::fetcher::CachedFetcher;
use crate::trends::models::{QueryParams, TrendingTerm};
use crate::trends::source::TrendsSource;

/// Trending terms analyzed in depth per discovery run.
pub const DISCOVERY_CANDIDATES: usize = 10;

/// Short window so momentum reflects the last few days.
pub const DISCOVERY_TIMEFRAME: &str = "now 7-d";

#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub trending: Vec<TrendingTerm>,
    pub candidates: Vec<String>,
    pub dataset: KeywordDataset,
    /// Candidates at or above the discovery threshold, best first
    pub opportunities: Vec<Opportunity>,
}

pub async fn run<S: TrendsSource>(
    fetcher: &CachedFetcher<S>,
    analyzer: &KeywordAnalyzer,
    geo: &str,
    category: u32,
    trending_limit: usize,
    max_per_request: usize,
) -> Result<DiscoveryReport> {
    let mut trending = fetcher.trending_searches(geo).await?;
    trending.truncate(trending_limit);

    if trending.is_empty() {
        bail!("No trending searches available for region {geo}");
    }
    info!(geo = geo, count = trending.len(), "Trending searches fetched");

    let mut candidates = dedup_keywords(trending.iter().map(|t| t.query.as_str()));
    candidates.truncate(DISCOVERY_CANDIDATES);
    if candidates.is_empty() {
        bail!("Trending searches for region {geo} contained no usable terms");
    }

    let params = QueryParams::new(DISCOVERY_TIMEFRAME, geo, category);
    let dataset =
        fetch_keyword_data(fetcher, &candidates, &params, max_per_request, analyzer).await?;

    let opportunities = analyzer.rank_opportunities(dataset.metrics_for(&candidates));
    info!(
        candidates = candidates.len(),
        opportunities = opportunities.len(),
        "Discovery scored"
    );

    Ok(DiscoveryReport {
        trending,
        candidates,
        dataset,
        opportunities,
    })
}
