use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use trendscope::analysis::{AnalyzerError, KeywordAnalyzer};
use trendscope::cache::DiskCache;
use trendscope::config::Config;
use trendscope::output::terminal;
use trendscope::pipeline::{discover, research};
use trendscope::trends::client::GoogleTrendsClient;
use trendscope::trends::error::FetchError;
use trendscope::trends::fetcher::CachedFetcher;
use trendscope::trends::models::QueryParams;

/// Trendscope: keyword trend research and opportunity discovery.
///
/// Fetches search-interest data (cached on disk, paced and retried), turns
/// it into per-keyword metrics, and scores keywords against a reference set
/// or on their own.
#[derive(Parser)]
#[command(name = "trendscope", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare keywords against reference keywords
    Research {
        /// Comma-separated keywords to research (at most 5 are analyzed)
        #[arg(long, value_delimiter = ',', required = true)]
        keywords: Vec<String>,

        /// Comma-separated reference keywords to benchmark against
        #[arg(long, value_delimiter = ',')]
        reference: Vec<String>,

        /// Timeframe, e.g. "now 1-d", "today 1-m", "today 12-m", "today 5-y"
        #[arg(long)]
        timeframe: Option<String>,

        /// Region code, e.g. US, GB, CA
        #[arg(long)]
        geo: Option<String>,

        /// Numeric category filter (0 = all)
        #[arg(long)]
        category: Option<u32>,
    },

    /// Score today's trending searches for opportunity
    Discover {
        /// Region code, e.g. US, GB, CA
        #[arg(long)]
        geo: Option<String>,

        /// Numeric category filter (0 = all)
        #[arg(long)]
        category: Option<u32>,
    },

    /// List cache entries with their age and freshness
    CacheInfo,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trendscope=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    let outcome = match cli.command {
        Commands::Research {
            keywords,
            reference,
            timeframe,
            geo,
            category,
        } => {
            let params = QueryParams::new(
                timeframe.as_deref().unwrap_or(&config.default_timeframe),
                geo.as_deref().unwrap_or(&config.default_geo),
                category.unwrap_or(config.default_category),
            );
            run_research(&config, &keywords, &reference, &params).await
        }

        Commands::Discover { geo, category } => {
            let geo = geo.unwrap_or_else(|| config.default_geo.clone());
            run_discover(&config, &geo, category.unwrap_or(config.default_category)).await
        }

        Commands::CacheInfo => {
            let cache = DiskCache::new(&config.cache_dir, config.cache_ttl);
            let entries = cache
                .entries()
                .with_context(|| format!("Failed to list {}", config.cache_dir.display()))?;
            terminal::display_cache_entries(&entries, cache.dir());
            Ok(())
        }
    };

    if let Err(e) = &outcome {
        if let Some(hint) = recovery_hint(e) {
            eprintln!("{}", hint.yellow());
        }
    }
    outcome
}

async fn run_research(
    config: &Config,
    keywords: &[String],
    references: &[String],
    params: &QueryParams,
) -> Result<()> {
    info!(keywords = ?keywords, references = ?references, "Research mode");

    let fetcher = build_fetcher(config)?;
    let mut analyzer = KeywordAnalyzer::new(config);

    let report = research::run(
        &fetcher,
        &mut analyzer,
        keywords,
        references,
        params,
        config.max_keywords_per_request,
    )
    .await?;

    if !report.dropped.is_empty() {
        println!(
            "{}",
            format!(
                "Only {} keywords are analyzed per run; ignored: {}",
                config.max_keywords_per_request,
                report.dropped.join(", ")
            )
            .yellow()
        );
    }

    terminal::display_metrics(report.dataset.metrics_for(&report.keywords));

    if !report.missing_references.is_empty() {
        println!(
            "{}",
            format!(
                "No data for reference keywords: {}",
                report.missing_references.join(", ")
            )
            .yellow()
        );
    }

    match &report.benchmark {
        Some(benchmark) => terminal::display_comparisons(benchmark, &report.comparisons),
        None if !references.is_empty() => {
            println!(
                "{}",
                "None of the reference keywords returned data, so no similarity scores."
                    .yellow()
            );
        }
        None => {}
    }

    Ok(())
}

async fn run_discover(config: &Config, geo: &str, category: u32) -> Result<()> {
    info!(geo = geo, "Discovery mode");

    let fetcher = build_fetcher(config)?;
    let analyzer = KeywordAnalyzer::new(config);

    let report = discover::run(
        &fetcher,
        &analyzer,
        geo,
        category,
        config.trending_limit,
        config.max_keywords_per_request,
    )
    .await?;

    println!(
        "Analyzed {} of {} trending searches in {geo}",
        report.candidates.len(),
        report.trending.len()
    );
    terminal::display_opportunities(&report.opportunities);
    Ok(())
}

fn build_fetcher(config: &Config) -> Result<CachedFetcher<GoogleTrendsClient>> {
    let client = GoogleTrendsClient::from_config(config).context("Failed to build HTTP client")?;
    Ok(CachedFetcher::new(client, config))
}

/// A follow-up suggestion for errors the user can act on.
fn recovery_hint(err: &anyhow::Error) -> Option<String> {
    for cause in err.chain() {
        if let Some(fetch) = cause.downcast_ref::<FetchError>() {
            return match fetch {
                FetchError::RateLimited { .. } => Some(
                    "Rate limited by the upstream. Cached keywords still load instantly; \
                     wait a few minutes or raise TRENDSCOPE_BACKOFF_SECS."
                        .to_string(),
                ),
                FetchError::Connection(_) => Some(
                    "Could not reach the upstream. Check your connection; cached keywords \
                     still work offline."
                        .to_string(),
                ),
                _ => None,
            };
        }
        if let Some(AnalyzerError::ReferenceNotSet) = cause.downcast_ref::<AnalyzerError>() {
            return Some(
                "Pass --reference with at least one keyword that has trend data.".to_string(),
            );
        }
    }
    None
}
