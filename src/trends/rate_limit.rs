// Request pacing and retry with exponential backoff for upstream calls.
//
// The trends endpoints start refusing requests quickly, so every call is
// spaced by a fixed interval from the previous one (`RequestPacer`), and
// transient failures are retried a bounded number of times with an
// exponentially growing wait (`RetryPolicy`).
//
// The retry decision is a pure function of (attempt number, error) so the
// schedule can be tested without sleeping. `with_retry` drives it.

use std::future::Future;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

use super::error::FetchError;
use crate::config::RetrySettings;

/// Enforces a minimum interval between consecutive upstream requests.
///
/// Holds a single "time of last request" marker. The lock is held across
/// the pacing sleep so overlapping callers queue up rather than racing.
pub struct RequestPacer {
    interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the interval since the last request has elapsed, then
    /// stamp the marker. Call immediately before issuing the request.
    ///
    /// Returns how long this call slept.
    pub async fn acquire(&self) -> Duration {
        let mut last = self.last_request.lock().await;
        let mut waited = Duration::ZERO;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.interval {
                waited = self.interval - elapsed;
                info!(
                    delay_secs = waited.as_secs_f64(),
                    "Rate limit backoff: sleeping {:.1}s",
                    waited.as_secs_f64()
                );
                tokio::time::sleep(waited).await;
            }
        }

        *last = Some(Instant::now());
        waited
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Bounded exponential retry policy.
///
/// The wait after failed attempt `k` (1-based) is
/// `base * exponential_base^(k-1)`, clamped to `[min, max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub min: Duration,
    pub max: Duration,
    pub exponential_base: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base: settings.base,
            min: settings.min,
            max: settings.max,
            exponential_base: settings.exponential_base,
        }
    }

    /// Wait that follows failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let factor = (self.exponential_base as f64).powi(exponent);
        let secs = (self.base.as_secs_f64() * factor).min(self.max.as_secs_f64());
        Duration::from_secs_f64(secs).clamp(self.min, self.max)
    }

    /// Decide whether failed attempt number `attempt` should be retried.
    pub fn decide(&self, attempt: u32, err: &FetchError) -> RetryDecision {
        if !err.is_transient() || attempt >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(self.delay_for(attempt))
        }
    }
}

/// Progress of one retry sequence: attempts made and waits taken.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryState {
    attempts: u32,
    waits: Vec<Duration>,
}

impl RetryState {
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The inter-attempt waits, in order.
    pub fn waits(&self) -> &[Duration] {
        &self.waits
    }

    pub fn total_backoff(&self) -> Duration {
        self.waits.iter().sum()
    }
}

/// Run `operation` under pacing and the retry policy.
///
/// After the attempt budget is spent the last error is returned as-is.
pub async fn with_retry<F, Fut, T>(
    pacer: &RequestPacer,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, FetchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut state = RetryState::default();
    retry_with_state(pacer, policy, &mut state, operation).await
}

/// Like `with_retry`, recording attempts and waits into `state`.
pub async fn retry_with_state<F, Fut, T>(
    pacer: &RequestPacer,
    policy: &RetryPolicy,
    state: &mut RetryState,
    operation: F,
) -> Result<T, FetchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    loop {
        pacer.acquire().await;
        state.attempts += 1;

        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match policy.decide(state.attempts, &err) {
            RetryDecision::GiveUp => {
                if err.is_transient() {
                    warn!(
                        attempts = state.attempts,
                        error = %err,
                        "Retry budget exhausted"
                    );
                }
                return Err(err);
            }
            RetryDecision::RetryAfter(delay) => {
                warn!(
                    attempt = state.attempts,
                    max_attempts = policy.max_attempts,
                    backoff_secs = delay.as_secs_f64(),
                    error = %err,
                    "Transient upstream failure, retrying in {:.1}s (attempt {}/{})",
                    delay.as_secs_f64(),
                    state.attempts,
                    policy.max_attempts,
                );
                state.waits.push(delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base: Duration::from_secs(1),
            min: Duration::from_secs(1),
            max: Duration::from_secs(10),
            exponential_base: 2,
        }
    }

    // ── RetryPolicy::delay_for ──────────────────────────────────────

    #[test]
    fn test_delay_doubles_from_base() {
        let policy = fast_policy(10);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = fast_policy(10);
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
        assert_eq!(policy.delay_for(60), Duration::from_secs(10));
    }

    #[test]
    fn test_delay_raised_to_min() {
        // Defaults: base 1s, min 4s, max 10s
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
    }

    // ── RetryPolicy::decide ─────────────────────────────────────────

    #[test]
    fn test_decide_retries_transient_errors() {
        let policy = fast_policy(3);
        let err = FetchError::RateLimited { status: 429 };
        assert_eq!(
            policy.decide(1, &err),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
        assert_eq!(
            policy.decide(2, &err),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_decide_gives_up_at_budget() {
        let policy = fast_policy(3);
        let err = FetchError::Connection("reset".into());
        assert_eq!(policy.decide(3, &err), RetryDecision::GiveUp);
    }

    #[test]
    fn test_decide_never_retries_permanent_errors() {
        let policy = fast_policy(3);
        let err = FetchError::from_status(500, "boom");
        assert_eq!(policy.decide(1, &err), RetryDecision::GiveUp);
    }

    // ── RequestPacer ────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let pacer = RequestPacer::new(Duration::from_secs(60));
        assert_eq!(pacer.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_acquire_waits_out_interval() {
        let pacer = RequestPacer::new(Duration::from_secs(60));
        pacer.acquire().await;
        tokio::time::advance(Duration::from_secs(20)).await;

        let start = Instant::now();
        let waited = pacer.acquire().await;
        assert_eq!(waited, Duration::from_secs(40));
        assert!(start.elapsed() >= Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_after_interval_does_not_wait() {
        let pacer = RequestPacer::new(Duration::from_secs(5));
        pacer.acquire().await;
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(pacer.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_serialized() {
        let pacer = Arc::new(RequestPacer::new(Duration::from_secs(10)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let p = Arc::clone(&pacer);
            handles.push(tokio::spawn(async move { p.acquire().await }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // Three requests need two full intervals between them
        assert!(start.elapsed() >= Duration::from_secs(20));
    }

    // ── with_retry ──────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_succeeds_immediately() {
        let pacer = RequestPacer::new(Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result = with_retry(&pacer, &fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, FetchError>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_last_attempt_with_exponential_waits() {
        let pacer = RequestPacer::new(Duration::ZERO);
        let policy = fast_policy(4);
        let calls = AtomicU32::new(0);
        let mut state = RetryState::default();

        let result = retry_with_state(&pacer, &policy, &mut state, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(FetchError::RateLimited { status: 429 })
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(state.attempts(), 4);
        assert_eq!(
            state.waits(),
            &[
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert_eq!(state.total_backoff(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_original_error() {
        let pacer = RequestPacer::new(Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(&pacer, &fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Connection("connection reset by peer".into())) }
        })
        .await;

        match result {
            Err(FetchError::Connection(msg)) => assert_eq!(msg, "connection reset by peer"),
            other => panic!("expected the connection error back, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let pacer = RequestPacer::new(Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(&pacer, &fast_policy(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::from_status(400, "bad request")) }
        })
        .await;

        assert!(matches!(result, Err(FetchError::Upstream { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_still_respect_pacing() {
        let pacer = RequestPacer::new(Duration::from_secs(30));
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let _ = with_retry(&pacer, &fast_policy(2), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(FetchError::RateLimited { status: 503 })
                } else {
                    Ok(())
                }
            }
        })
        .await;

        // 1s retry wait, then the pacer tops it up to the 30s interval
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
