//! Sliding-window rate limiter shared by every platform call site.
//!
//! One window per endpoint class. `acquire` holds the class's lock across the
//! whole "prune, maybe sleep, record" sequence, so concurrent workers can never
//! both pass the quota check before either records its request.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::{
    BackoffConfig, EndpointClass, RateLimitConfig, WindowConfig, WindowUsage, HIGH_USAGE_FRACTION,
};

/// Request timestamps inside the trailing window.
#[derive(Debug, Default)]
struct RateWindow {
    requests: VecDeque<Instant>,
    total_requests: u64,
}

impl RateWindow {
    /// Drop every timestamp that has aged out of the window.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.requests.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    fn record(&mut self, at: Instant) {
        self.requests.push_back(at);
        self.total_requests += 1;
    }
}

struct ClassState {
    config: WindowConfig,
    window: Mutex<RateWindow>,
    // Kept outside the window lock so reporting never queues behind a sleeping acquirer.
    failures: AtomicU32,
}

impl ClassState {
    fn new(config: WindowConfig) -> Self {
        Self {
            config,
            window: Mutex::new(RateWindow::default()),
            failures: AtomicU32::new(0),
        }
    }
}

struct Inner {
    search: ClassState,
    post: ClassState,
    backoff: BackoffConfig,
}

/// Cooperative throttle for platform requests.
///
/// Cheap to clone; all clones share the same windows. Construct one per bot
/// identity and hand it to the fetcher and the poster.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                search: ClassState::new(config.search),
                post: ClassState::new(config.post),
                backoff: config.backoff,
            }),
        }
    }

    fn state(&self, class: EndpointClass) -> &ClassState {
        match class {
            EndpointClass::Search => &self.inner.search,
            EndpointClass::Post => &self.inner.post,
        }
    }

    /// Wait until one request of `class` may be issued, then record it.
    ///
    /// Never fails. Returns the total time spent waiting.
    pub async fn acquire(&self, class: EndpointClass) -> Duration {
        let state = self.state(class);
        let config = &state.config;
        let started = Instant::now();

        let mut window = state.window.lock().await;

        let failures = state.failures.load(Ordering::SeqCst);
        let backoff = self.inner.backoff.delay_for(failures);
        if !backoff.is_zero() {
            warn!(
                class = %class,
                failures,
                "Backing off {:?} after consecutive failures",
                backoff
            );
            tokio::time::sleep(backoff).await;
        }

        let window_len = config.window();
        let buffer_quota = config.buffer_quota();

        window.prune(Instant::now(), window_len);
        if window.requests.len() >= buffer_quota as usize {
            if let Some(&oldest) = window.requests.front() {
                let wait = (oldest + window_len).saturating_duration_since(Instant::now());
                if !wait.is_zero() {
                    warn!(
                        class = %class,
                        "Rate limit buffer reached ({}/{}), waiting {:?}",
                        window.requests.len(),
                        buffer_quota,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
            }
            window.prune(Instant::now(), window_len);
        }

        let min_interval = config.min_interval();
        if let Some(&last) = window.requests.back() {
            let since_last = Instant::now().saturating_duration_since(last);
            if since_last < min_interval {
                let wait = min_interval - since_last;
                debug!(class = %class, "Enforcing minimum interval, waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }

        let max_jitter = config.max_jitter();
        if !max_jitter.is_zero() {
            let jitter = rand::thread_rng().gen_range(Duration::ZERO..=max_jitter);
            tokio::time::sleep(jitter).await;
        }

        window.record(Instant::now());

        let current = window.requests.len();
        if current as f64 > buffer_quota as f64 * HIGH_USAGE_FRACTION {
            warn!(
                class = %class,
                "High rate limit usage: {}/{} ({:.1}%)",
                current,
                buffer_quota,
                current as f64 / buffer_quota as f64 * 100.0
            );
        } else if window.total_requests % 10 == 0 {
            info!(
                class = %class,
                "Rate limit status: {}/{} in window",
                current,
                buffer_quota
            );
        }

        started.elapsed()
    }

    /// Record a failed request; feeds the backoff counter.
    pub fn report_failure(&self, class: EndpointClass) {
        let failures = self.state(class).failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures > self.inner.backoff.failure_threshold {
            warn!(
                class = %class,
                failures,
                "Consecutive failures past threshold, next request backs off {:?}",
                self.inner.backoff.delay_for(failures)
            );
        } else {
            debug!(class = %class, failures, "Request failure recorded");
        }
    }

    /// Record a successful request; clears the backoff counter.
    pub fn report_success(&self, class: EndpointClass) {
        let previous = self.state(class).failures.swap(0, Ordering::SeqCst);
        if previous > self.inner.backoff.failure_threshold {
            info!(class = %class, "Recovered after {} consecutive failures", previous);
        }
    }

    pub fn consecutive_failures(&self, class: EndpointClass) -> u32 {
        self.state(class).failures.load(Ordering::SeqCst)
    }

    /// Current window occupancy for `class`.
    pub async fn usage(&self, class: EndpointClass) -> WindowUsage {
        let state = self.state(class);
        let mut window = state.window.lock().await;
        window.prune(Instant::now(), state.config.window());
        WindowUsage {
            class,
            current_requests: window.requests.len(),
            buffer_quota: state.config.buffer_quota(),
            hard_quota: state.config.hard_quota,
            consecutive_failures: state.failures.load(Ordering::SeqCst),
        }
    }
}
