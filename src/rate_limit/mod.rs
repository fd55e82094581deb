//! Rate limiting for platform API requests.
//!
//! Each endpoint class (search, post) has its own sliding window, a buffer
//! quota kept below the platform's hard quota, a minimum spacing between
//! requests, random jitter, and exponential backoff after consecutive
//! failures. State is in-memory and resets on restart; the buffer margin
//! absorbs that.

mod config;
mod limiter;

pub use config::{BackoffConfig, EndpointClass, RateLimitConfig, WindowConfig, WindowUsage};
pub use limiter::RateLimiter;

/// Parse a Retry-After header value (seconds).
/// Returns the duration to wait, or None if the header is missing/invalid.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<std::time::Duration> {
    let value = header_value?;
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(std::time::Duration::from_secs)
}
