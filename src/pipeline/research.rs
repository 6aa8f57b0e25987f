// Research flow: compare a handful of keywords against reference keywords.
//
// Research keywords are capped at the per-request ceiling. Reference
// keywords are fetched alongside them (extra batches if needed) so both
// sides come from the same timeframe and region.

use anyhow::{bail, Result};
use tracing::{info, warn};

use super::batch::{dedup_keywords, fetch_keyword_data, KeywordDataset};
use crate::analysis::{Benchmark, ComparisonScore, KeywordAnalyzer};
use crate::trends::fetcher::CachedFetcher;
use crate::trends::models::QueryParams;
use crate::trends::source::TrendsSource;

#[derive(Debug, Clone)]
pub struct ResearchReport {
    /// Research keywords actually analyzed, after dedup and capping
    pub keywords: Vec<String>,
    /// Research keywords dropped by the per-request cap
    pub dropped: Vec<String>,
    pub dataset: KeywordDataset,
    pub benchmark: Option<Benchmark>,
    /// One score per research keyword, in request order. Empty without a benchmark.
    pub comparisons: Vec<ComparisonScore>,
    /// Reference keywords the upstream returned no series for
    pub missing_references: Vec<String>,
}

pub async fn run<S: TrendsSource>(
    fetcher: &CachedFetcher<S>,
    analyzer: &mut KeywordAnalyzer,
    keywords: &[String],
    references: &[String],
    params: &QueryParams,
    max_per_request: usize,
) -> Result<ResearchReport> {
    let mut keywords = dedup_keywords(keywords);
    if keywords.is_empty() {
        bail!("No keywords provided. Pass a comma-separated list with --keywords.");
    }

    let dropped = if keywords.len() > max_per_request {
        let dropped = keywords.split_off(max_per_request);
        warn!(
            limit = max_per_request,
            dropped = ?dropped,
            "Too many research keywords, extra keywords ignored"
        );
        dropped
    } else {
        Vec::new()
    };

    let references = dedup_keywords(references);
    let to_fetch = dedup_keywords(keywords.iter().chain(references.iter()));
    if to_fetch.len() > max_per_request {
        info!(
            total = to_fetch.len(),
            limit = max_per_request,
            "Reference keywords will be fetched in a separate batch"
        );
    }

    let dataset =
        fetch_keyword_data(fetcher, &to_fetch, params, max_per_request, analyzer).await?;

    let (present, missing_references): (Vec<String>, Vec<String>) = references
        .iter()
        .cloned()
        .partition(|kw| dataset.has_data(kw));

    let mut comparisons = Vec::new();
    let benchmark = if references.is_empty() {
        None
    } else {
        let benchmark = analyzer
            .set_reference_keywords(&present, &dataset.metrics)
            .cloned();

        if benchmark.is_some() {
            for keyword in &keywords {
                if let Some(metrics) = dataset.metrics.get(keyword) {
                    let score = analyzer.compare_to_reference(keyword, metrics)?;
                    info!(
                        keyword = keyword.as_str(),
                        similarity = score.similarity_score,
                        interest_gap = score.avg_interest_gap,
                        momentum_gap = score.momentum_gap,
                        "Compared to reference"
                    );
                    comparisons.push(score);
                }
            }
        } else {
            warn!(references = ?references, "Reference keywords not found in results");
        }
        benchmark
    };

    Ok(ResearchReport {
        keywords,
        dropped,
        dataset,
        benchmark,
        comparisons,
        missing_references,
    })
}
