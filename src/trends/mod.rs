// Upstream trends data: transport, error taxonomy, pacing/retry and the
// caching fetcher that the rest of the crate talks to.
//
// The TrendsSource trait is the transport seam. GoogleTrendsClient speaks
// to the real service; CachedFetcher wraps any source with the on-disk
// cache, request pacing and the bounded retry policy.

pub mod client;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod rate_limit;
pub mod source;
