use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Default upstream endpoint for the trends explore and widget-data APIs.
pub const DEFAULT_API_URL: &str = "https://trends.google.com";

/// Weights for the five opportunity-score components. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityWeights {
    pub avg_interest: f64,
    pub momentum: f64,
    pub breakout_queries: f64,
    pub breadth: f64,
    pub recency: f64,
}

impl Default for OpportunityWeights {
    fn default() -> Self {
        Self {
            avg_interest: 0.25,
            momentum: 0.25,
            breakout_queries: 0.20,
            breadth: 0.15,
            recency: 0.15,
        }
    }
}

impl OpportunityWeights {
    pub fn sum(&self) -> f64 {
        self.avg_interest + self.momentum + self.breakout_queries + self.breadth + self.recency
    }
}

/// Scoring thresholds and window sizes used by the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Keywords averaging below this get no interest credit.
    pub min_avg_interest: f64,
    /// Breakout-query count that earns half of the breakout component.
    pub min_breakout_queries: u32,
    /// Related-query count that earns half of the breadth component.
    pub min_related_queries: u32,
    /// Number of trailing periods inspected for a recent peak.
    pub recent_peak_window: usize,
    /// Average interest that earns the full interest component.
    pub interest_ceiling: f64,
    /// Fixed recency component when a recent peak is present.
    pub recency_bonus: f64,
    /// Discovery keeps only opportunities scoring at or above this.
    pub min_discovery_score: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_avg_interest: 5.0,
            min_breakout_queries: 2,
            min_related_queries: 5,
            recent_peak_window: 13,
            interest_ceiling: 80.0,
            recency_bonus: 50.0,
            min_discovery_score: 40.0,
        }
    }
}

/// Bounded exponential retry settings for upstream calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Multiplier applied to `exponential_base^(attempt-1)`.
    pub base: Duration,
    pub min: Duration,
    pub max: Duration,
    pub exponential_base: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(1),
            min: Duration::from_secs(4),
            max: Duration::from_secs(10),
            exponential_base: 2,
        }
    }
}

/// Central configuration, built once and passed into the fetcher and analyzer.
///
/// Everything network- or path-related comes from env vars (a .env file is
/// loaded at startup via dotenvy). Scoring policy lives in the `Default`
/// impls above and can be overridden by constructing the struct directly.
#[derive(Debug, Clone)]
pub struct Config {
    pub default_timeframe: String,
    pub default_geo: String,
    pub default_category: u32,
    /// Interface language sent upstream as `hl`.
    pub language: String,
    /// Timezone offset in minutes sent upstream as `tz`.
    pub tz_offset: i32,
    /// Minimum spacing between consecutive upstream requests.
    pub backoff: Duration,
    pub retry: RetrySettings,
    pub weights: OpportunityWeights,
    pub thresholds: Thresholds,
    /// Upstream ceiling on keywords compared in one request.
    pub max_keywords_per_request: usize,
    /// How many trending terms discovery considers.
    pub trending_limit: usize,
    pub cache_dir: PathBuf,
    pub cache_ttl: Duration,
    pub api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timeframe: "today 12-m".to_string(),
            default_geo: "US".to_string(),
            default_category: 0,
            language: "en-US".to_string(),
            tz_offset: 360,
            backoff: Duration::from_secs(60),
            retry: RetrySettings::default(),
            weights: OpportunityWeights::default(),
            thresholds: Thresholds::default(),
            max_keywords_per_request: 5,
            trending_limit: 50,
            cache_dir: default_cache_dir(),
            cache_ttl: Duration::from_secs(86_400),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// Returns the default cache directory: ~/.cache/trendscope/ on Linux.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("trendscope")
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let retry = RetrySettings {
            max_attempts: env_parse("TRENDSCOPE_RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
            base: env_secs("TRENDSCOPE_RETRY_BASE_SECS", defaults.retry.base)?,
            min: env_secs("TRENDSCOPE_RETRY_MIN_SECS", defaults.retry.min)?,
            max: env_secs("TRENDSCOPE_RETRY_MAX_SECS", defaults.retry.max)?,
            exponential_base: defaults.retry.exponential_base,
        };

        let config = Self {
            default_timeframe: env::var("TRENDSCOPE_TIMEFRAME")
                .unwrap_or(defaults.default_timeframe),
            default_geo: env::var("TRENDSCOPE_GEO").unwrap_or(defaults.default_geo),
            default_category: env_parse("TRENDSCOPE_CATEGORY", defaults.default_category)?,
            language: env::var("TRENDSCOPE_LANGUAGE").unwrap_or(defaults.language),
            tz_offset: env_parse("TRENDSCOPE_TZ_OFFSET", defaults.tz_offset)?,
            backoff: env_secs("TRENDSCOPE_BACKOFF_SECS", defaults.backoff)?,
            retry,
            weights: defaults.weights,
            thresholds: defaults.thresholds,
            max_keywords_per_request: defaults.max_keywords_per_request,
            trending_limit: defaults.trending_limit,
            cache_dir: env::var("TRENDSCOPE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            cache_ttl: env_secs("TRENDSCOPE_CACHE_TTL_SECS", defaults.cache_ttl)?,
            api_url: env::var("TRENDSCOPE_API_URL").unwrap_or(defaults.api_url),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the fetcher or analyzer cannot honor.
    pub fn validate(&self) -> Result<()> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            anyhow::bail!("Opportunity weights must sum to 1.0 (got {sum:.4})");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("TRENDSCOPE_RETRY_MAX_ATTEMPTS must be at least 1");
        }
        if self.retry.min > self.retry.max {
            anyhow::bail!(
                "Retry backoff minimum ({:?}) exceeds maximum ({:?})",
                self.retry.min,
                self.retry.max
            );
        }
        if self.max_keywords_per_request == 0 {
            anyhow::bail!("max_keywords_per_request must be at least 1");
        }
        Ok(())
    }
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn env_secs(name: &str, default: Duration) -> Result<Duration> {
    match env::var(name) {
        Ok(raw) => {
            let secs: f64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{name} has an invalid value: {raw:?}"))?;
            if !secs.is_finite() || secs < 0.0 {
                anyhow::bail!("{name} must be a non-negative number of seconds (got {raw:?})");
            }
            Ok(Duration::from_secs_f64(secs))
        }
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((OpportunityWeights::default().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_unbalanced_weights() {
        let mut config = Config::default();
        config.weights.recency = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_backoff_bounds() {
        let mut config = Config::default();
        config.retry.min = Duration::from_secs(30);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_match_upstream_limits() {
        let config = Config::default();
        assert_eq!(config.max_keywords_per_request, 5);
        assert_eq!(config.cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.thresholds.recent_peak_window, 13);
    }
}
