// Batch fetch: split a keyword list to fit the upstream's per-request
// ceiling, fetch every chunk, and stitch the results back together.
//
// Any chunk failure aborts the whole operation. Partial results are never
// returned, because metrics computed over half a keyword list would be
// silently incomparable with each other. Regional interest is the one
// exception: it is only fetched for single-keyword chunks and a failure
// there is logged and skipped.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::analysis::{KeywordAnalyzer, KeywordMetrics};
use crate::trends::fetcher::CachedFetcher;
use crate::trends::models::{
    QueryParams, RelatedQueries, Table, DATE_INDEX, DEFAULT_RESOLUTION,
};
use crate::trends::source::TrendsSource;

/// Everything fetched and computed for one keyword list.
#[derive(Debug, Clone, Default)]
pub struct KeywordDataset {
    pub metrics: BTreeMap<String, KeywordMetrics>,
    /// Merged interest over time, one column per keyword
    pub interest: Table,
    /// Regional interest, keyed by keyword (single-keyword chunks only)
    pub regions: BTreeMap<String, Table>,
    pub related: RelatedQueries,
}

impl KeywordDataset {
    /// Whether the upstream returned a non-empty interest series for `keyword`.
    pub fn has_data(&self, keyword: &str) -> bool {
        self.interest
            .column(keyword)
            .is_some_and(|values| !values.is_empty())
    }

    /// Metrics in the order the keywords were requested.
    pub fn metrics_for<'a>(
        &'a self,
        keywords: &'a [String],
    ) -> impl Iterator<Item = &'a KeywordMetrics> {
        keywords.iter().filter_map(|kw| self.metrics.get(kw))
    }
}

/// Fetch interest and related queries for `keywords` in chunks of
/// `batch_size`, then extract metrics for every requested keyword.
pub async fn fetch_keyword_data<S: TrendsSource>(
    fetcher: &CachedFetcher<S>,
    keywords: &[String],
    params: &QueryParams,
    batch_size: usize,
    analyzer: &KeywordAnalyzer,
) -> Result<KeywordDataset> {
    anyhow::ensure!(batch_size > 0, "batch size must be at least 1");

    let mut dataset = KeywordDataset {
        interest: Table::new(DATE_INDEX),
        ..KeywordDataset::default()
    };

    let chunks: Vec<&[String]> = keywords.chunks(batch_size).collect();
    info!(
        keywords = keywords.len(),
        batches = chunks.len(),
        timeframe = params.timeframe.as_str(),
        geo = params.geo.as_str(),
        "Fetching keyword data"
    );

    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  Batches [{bar:30}] {pos}/{len} {msg}")
            .context("invalid progress bar template")?,
    );

    for (i, &chunk) in chunks.iter().enumerate() {
        pb.set_message(chunk.join(", "));

        let interest = fetcher
            .interest_over_time(chunk, params)
            .await
            .with_context(|| format!("interest over time failed for batch {}: {chunk:?}", i + 1));
        let interest = match interest {
            Ok(table) => table,
            Err(e) => {
                pb.abandon();
                return Err(e);
            }
        };
        dataset.interest.merge_columns(&interest);

        let related = fetcher
            .related_queries(chunk, params)
            .await
            .with_context(|| format!("related queries failed for batch {}: {chunk:?}", i + 1));
        match related {
            Ok(related) => dataset.related.extend(related),
            Err(e) => {
                pb.abandon();
                return Err(e);
            }
        }

        if let [keyword] = chunk {
            match fetcher
                .interest_by_region(chunk, params, DEFAULT_RESOLUTION)
                .await
            {
                Ok(table) => {
                    dataset.regions.insert(keyword.clone(), table);
                }
                Err(e) => {
                    warn!(
                        keyword = keyword.as_str(),
                        error = %e,
                        "Regional interest unavailable, skipping"
                    );
                }
            }
        }

        info!(batch = i + 1, of = chunks.len(), "Batch fetched");
        pb.inc(1);
    }
    pb.finish_and_clear();

    for keyword in keywords {
        let metrics = analyzer.extract_metrics(keyword, &dataset.interest, &dataset.related);
        dataset.metrics.insert(keyword.clone(), metrics);
    }

    Ok(dataset)
}

/// Drop duplicates and blank entries, keeping first-seen order.
pub fn dedup_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for kw in keywords {
        let kw = kw.as_ref().trim();
        if !kw.is_empty() && !out.iter().any(|k| k == kw) {
            out.push(kw.to_string());
        }
    }
    out
}
