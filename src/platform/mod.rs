//! Social platform API surface.
//!
//! The pipeline only needs two calls: a paginated recent search and posting a
//! reply. Both report quota exhaustion distinctly from other failures so the
//! caller can stop the cycle instead of burning through remaining work.

mod types;
mod x_api;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use types::{Tweet, TweetMetrics, User, UserMetrics};
pub use x_api::{PlatformConfig, XApiClient};

/// Platform call failures.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The platform says we are over quota. Never a per-item failure.
    #[error("rate limited by platform{}", retry_hint(.retry_after))]
    QuotaExceeded { retry_after: Option<Duration> },

    /// Timeout, refused connection, reset.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success response that is not a quota signal.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Missing credentials or an unusable client setup.
    #[error("platform not configured: {0}")]
    Config(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(" (retry after {}s)", d.as_secs()))
        .unwrap_or_default()
}

impl PlatformError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            PlatformError::Malformed(e.to_string())
        } else if let Some(status) = e.status() {
            PlatformError::Api {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            PlatformError::Network(e.to_string())
        }
    }
}

/// One page request against the recent-search endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    /// Results wanted on this page (clients clamp to what the endpoint allows).
    pub max_results: u32,
    pub next_token: Option<String>,
}

/// One page of search results with the expanded authors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub tweets: Vec<Tweet>,
    pub users: Vec<User>,
    pub next_token: Option<String>,
}

impl SearchPage {
    /// Author record for a post, if the expansion included it.
    pub fn author(&self, tweet: &Tweet) -> Option<&User> {
        let author_id = tweet.author_id.as_deref()?;
        self.users.iter().find(|u| u.id == author_id)
    }
}

/// A reply we just created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedReply {
    pub id: String,
}

/// Platform operations used by the fetcher and poster.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, PlatformError>;

    async fn create_reply(&self, text: &str, in_reply_to: &str) -> Result<PostedReply, PlatformError>;
}
