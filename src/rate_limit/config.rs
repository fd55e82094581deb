//! Rate limiter configuration and types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Usage fraction of the buffer quota above which acquires log a warning.
pub const HIGH_USAGE_FRACTION: f64 = 0.8;

/// A category of platform call sharing one rate-limit budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
    /// Recent-search requests (one per result page).
    Search,
    /// Posting a message or reply.
    Post,
}

impl EndpointClass {
    pub const ALL: [EndpointClass; 2] = [EndpointClass::Search, EndpointClass::Post];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota settings for one endpoint class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Length of the rolling window in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Hard quota the platform enforces per window.
    pub hard_quota: u32,
    /// Fraction of the hard quota we allow ourselves to use.
    #[serde(default = "default_buffer_fraction")]
    pub buffer_fraction: f64,
    /// Minimum spacing between requests in milliseconds.
    /// Defaults to `window / buffer_quota` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_interval_ms: Option<u64>,
    /// Upper bound of the random delay added to every acquire, in milliseconds.
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

fn default_window_secs() -> u64 {
    15 * 60
}

fn default_buffer_fraction() -> f64 {
    0.9
}

fn default_max_jitter_ms() -> u64 {
    2_000
}

impl WindowConfig {
    /// Platform search budget: 180 requests per 15 minutes, we use 160.
    pub fn search_default() -> Self {
        Self {
            window_secs: default_window_secs(),
            hard_quota: 180,
            buffer_fraction: 160.0 / 180.0,
            min_interval_ms: None,
            max_jitter_ms: default_max_jitter_ms(),
        }
    }

    /// Platform posting budget: 200 requests per 15 minutes, we use 180.
    pub fn post_default() -> Self {
        Self {
            window_secs: default_window_secs(),
            hard_quota: 200,
            buffer_fraction: default_buffer_fraction(),
            min_interval_ms: None,
            max_jitter_ms: default_max_jitter_ms(),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Self-imposed ceiling below the hard quota. Never less than one.
    pub fn buffer_quota(&self) -> u32 {
        let fraction = self.buffer_fraction.clamp(0.0, 1.0);
        // Small epsilon so 160/180 * 180 doesn't floor to 159.
        let quota = (self.hard_quota as f64 * fraction + 1e-9).floor() as u32;
        quota.max(1)
    }

    pub fn min_interval(&self) -> Duration {
        match self.min_interval_ms {
            Some(ms) => Duration::from_millis(ms),
            None => self.window() / self.buffer_quota(),
        }
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }
}

/// Exponential backoff applied after consecutive failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Consecutive failures tolerated before backing off.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Base delay in seconds.
    #[serde(default = "default_backoff_base_secs")]
    pub base_secs: u64,
    /// Ceiling for the delay in seconds.
    #[serde(default = "default_backoff_cap_secs")]
    pub cap_secs: u64,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_backoff_base_secs() -> u64 {
    30
}

fn default_backoff_cap_secs() -> u64 {
    60 * 60
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            base_secs: default_backoff_base_secs(),
            cap_secs: default_backoff_cap_secs(),
        }
    }
}

impl BackoffConfig {
    /// Delay owed for `failures` consecutive failures:
    /// `min(cap, base * 2^(failures - threshold))` once past the threshold.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures <= self.failure_threshold {
            return Duration::ZERO;
        }
        let base = Duration::from_secs(self.base_secs);
        let cap = Duration::from_secs(self.cap_secs);
        let exponent = failures - self.failure_threshold;
        // 2^31 seconds is far beyond any sane cap.
        let factor = 1u32.checked_shl(exponent.min(31)).unwrap_or(u32::MAX);
        base.saturating_mul(factor).min(cap)
    }
}

/// Full limiter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "WindowConfig::search_default")]
    pub search: WindowConfig,
    #[serde(default = "WindowConfig::post_default")]
    pub post: WindowConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            search: WindowConfig::search_default(),
            post: WindowConfig::post_default(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self, class: EndpointClass) -> &WindowConfig {
        match class {
            EndpointClass::Search => &self.search,
            EndpointClass::Post => &self.post,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Snapshot of one class's window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowUsage {
    pub class: EndpointClass,
    pub current_requests: usize,
    pub buffer_quota: u32,
    pub hard_quota: u32,
    pub consecutive_failures: u32,
}

impl WindowUsage {
    pub fn usage_percentage(&self) -> f64 {
        self.current_requests as f64 / self.buffer_quota as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buffer_quotas() {
        assert_eq!(WindowConfig::search_default().buffer_quota(), 160);
        assert_eq!(WindowConfig::post_default().buffer_quota(), 180);
    }

    #[test]
    fn test_min_interval_derived_from_buffer() {
        let search = WindowConfig::search_default();
        assert_eq!(search.min_interval(), Duration::from_millis(5_625));

        let explicit = WindowConfig {
            min_interval_ms: Some(250),
            ..WindowConfig::post_default()
        };
        assert_eq!(explicit.min_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_buffer_quota_never_zero() {
        let tiny = WindowConfig {
            hard_quota: 1,
            buffer_fraction: 0.5,
            ..WindowConfig::post_default()
        };
        assert_eq!(tiny.buffer_quota(), 1);
    }

    #[test]
    fn test_backoff_delay_growth() {
        let backoff = BackoffConfig {
            failure_threshold: 2,
            base_secs: 10,
            cap_secs: 100,
        };
        assert_eq!(backoff.delay_for(0), Duration::ZERO);
        assert_eq!(backoff.delay_for(2), Duration::ZERO);
        assert_eq!(backoff.delay_for(3), Duration::from_secs(20));
        assert_eq!(backoff.delay_for(4), Duration::from_secs(40));
        assert_eq!(backoff.delay_for(5), Duration::from_secs(80));
        assert_eq!(backoff.delay_for(6), Duration::from_secs(100));
        assert_eq!(backoff.delay_for(200), Duration::from_secs(100));
    }
}
