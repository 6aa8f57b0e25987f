// Colored terminal output for metrics, comparisons and opportunities.
//
// This module handles all terminal-specific formatting. The main.rs command
// handlers delegate here and never print tables themselves.

use colored::Colorize;

use super::{format_age, truncate_chars};
use crate::analysis::{Benchmark, ComparisonScore, KeywordMetrics, Opportunity};
use crate::cache::CacheEntryInfo;

const KEYWORD_WIDTH: usize = 28;

/// Display per-keyword metrics in request order.
pub fn display_metrics<'a>(metrics: impl IntoIterator<Item = &'a KeywordMetrics>) {
    let metrics: Vec<&KeywordMetrics> = metrics.into_iter().collect();
    if metrics.is_empty() {
        println!("No keyword metrics to show.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Keyword Metrics ({} keywords) ===", metrics.len()).bold()
    );
    println!();
    println!(
        "  {:<30} {:>6} {:>6} {:>6} {:>9} {:>7} {:>7} {:>8}  {}",
        "Keyword".dimmed(),
        "Avg".dimmed(),
        "Max".dimmed(),
        "Vol".dimmed(),
        "Momentum".dimmed(),
        "Related".dimmed(),
        "Rising".dimmed(),
        "Breakout".dimmed(),
        "Peak".dimmed(),
    );
    println!("  {}", "-".repeat(96).dimmed());

    for m in metrics {
        let peak = if m.recent_peak {
            format!("yes ({:.0})", m.recent_peak_value).green().to_string()
        } else {
            "no".normal().to_string()
        };
        println!(
            "  {:<30} {:>6.1} {:>6.0} {:>6.1} {:>9} {:>7} {:>7} {:>8}  {}",
            truncate_chars(&m.keyword, KEYWORD_WIDTH),
            m.avg_interest,
            m.max_interest,
            m.volatility,
            colorize_momentum(m.momentum),
            m.related_queries_count,
            m.rising_queries_count,
            m.breakout_queries_count,
            peak,
        );
    }
    println!();
}

/// Display the reference benchmark and similarity scores against it.
pub fn display_comparisons(benchmark: &Benchmark, scores: &[ComparisonScore]) {
    let members: Vec<&str> = benchmark.keywords().collect();
    println!(
        "\n{}",
        format!("=== Similarity to Reference ({}) ===", members.join(", ")).bold()
    );
    println!(
        "  Benchmark: interest {:.1}, momentum {:+.2}, breadth {:.1}",
        benchmark.avg_interest, benchmark.momentum, benchmark.breadth
    );
    println!();

    if scores.is_empty() {
        println!("  No research keywords had data to compare.");
        return;
    }

    println!(
        "  {:<30} {:>10} {:>12} {:>12} {:>12}",
        "Keyword".dimmed(),
        "Similarity".dimmed(),
        "Interest gap".dimmed(),
        "Momentum gap".dimmed(),
        "Breadth gap".dimmed(),
    );
    println!("  {}", "-".repeat(80).dimmed());

    for score in scores {
        println!(
            "  {:<30} {:>10} {:>12.1} {:>12.2} {:>12.1}",
            truncate_chars(&score.keyword, KEYWORD_WIDTH),
            colorize_score(score.similarity_score),
            score.avg_interest_gap,
            score.momentum_gap,
            score.breadth_gap,
        );
    }
    println!();
}

/// Display ranked discovery opportunities.
pub fn display_opportunities(opportunities: &[Opportunity]) {
    if opportunities.is_empty() {
        println!("No trending term cleared the discovery threshold.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Top Discovery Opportunities ({}) ===", opportunities.len()).bold()
    );
    println!();

    for (rank, opp) in opportunities.iter().enumerate() {
        println!(
            "  {:>3}. {:<30} score {}  interest {:.1}, queries {}, rising {}",
            rank + 1,
            truncate_chars(&opp.keyword, KEYWORD_WIDTH),
            colorize_score(opp.score),
            opp.metrics.avg_interest,
            opp.metrics.related_queries_count,
            opp.metrics.rising_queries_count,
        );
    }
    println!();
}

/// Display cache entries with age and freshness.
pub fn display_cache_entries(entries: &[CacheEntryInfo], dir: &std::path::Path) {
    println!("\n{}", format!("=== Cache ({}) ===", dir.display()).bold());

    if entries.is_empty() {
        println!("  Cache is empty.");
        return;
    }

    let fresh = entries.iter().filter(|e| e.fresh).count();
    println!(
        "  {} entries, {} fresh, {} stale",
        entries.len(),
        fresh,
        entries.len() - fresh
    );
    println!();

    for entry in entries {
        let status = if entry.fresh {
            "fresh".green()
        } else {
            "stale".yellow()
        };
        println!(
            "  {:<6} {:>9} {:>8}  {}",
            status,
            format_age(entry.age),
            format!("{}B", entry.size_bytes).dimmed(),
            entry.key,
        );
    }
    println!();
}

fn colorize_momentum(momentum: f64) -> colored::ColoredString {
    let text = format!("{momentum:+.2}");
    if momentum > 0.25 {
        text.green()
    } else if momentum < -0.25 {
        text.red()
    } else {
        text.normal()
    }
}

fn colorize_score(score: f64) -> colored::ColoredString {
    let text = format!("{score:.1}");
    match score {
        s if s >= 70.0 => text.green().bold(),
        s if s >= 40.0 => text.yellow(),
        _ => text.dimmed(),
    }
}
