// Fetch error taxonomy.
//
// Only throttling and connection failures are transient; the retry loop
// consults `is_transient()` and hands every other variant straight back.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The upstream signalled throttling (HTTP 429 or 503).
    #[error(
        "trends service rate limited the request (HTTP {status}); \
         wait a few minutes and retry, or rely on cached data"
    )]
    RateLimited { status: u16 },

    /// The request never got a response: refused, reset, DNS, or timeout.
    #[error(
        "could not reach the trends service: {0}; \
         check connectivity and retry, or rely on cached data"
    )]
    Connection(String),

    /// Any other non-success status.
    #[error("trends service returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The request could not be built or sent for a non-network reason.
    #[error("trends request failed: {0}")]
    Request(String),

    /// The response (or a cached payload) did not have the expected shape.
    #[error("could not decode trends response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            429 | 503 => FetchError::RateLimited { status },
            _ => FetchError::Upstream {
                status,
                body: body.into(),
            },
        }
    }

    /// Whether the retry loop may try again after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. } | FetchError::Connection(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return FetchError::from_status(status.as_u16(), err.to_string());
        }
        if err.is_connect() || err.is_timeout() {
            FetchError::Connection(err.to_string())
        } else if err.is_decode() || err.is_body() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}
