//! reqwest client for the X API v2.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{ApiProblem, CreateTweetRequest, CreateTweetResponse, ReplySettings, SearchResponse};
use super::{Platform, PlatformError, PostedReply, SearchPage, SearchRequest};
use crate::rate_limit::parse_retry_after;

/// Smallest and largest page sizes the recent-search endpoint accepts.
const SEARCH_PAGE_MIN: u32 = 10;
const SEARCH_PAGE_MAX: u32 = 100;

const TWEET_FIELDS: &str = "created_at,public_metrics,author_id,conversation_id";
const USER_FIELDS: &str = "username,public_metrics,verified";

/// Connection settings for the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// App-only bearer token (search).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
    /// User-context access token (posting).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_token: Option<String>,
    /// Handle our parent messages are posted under.
    #[serde(default)]
    pub author_handle: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.x.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            bearer_token: None,
            user_token: None,
            author_handle: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PlatformConfig {
    /// Apply environment variable overrides.
    ///
    /// - `X_API_BASE`
    /// - `X_BEARER_TOKEN`
    /// - `X_USER_TOKEN`
    /// - `REPLY_AUTHOR_HANDLE`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("X_API_BASE") {
            self.api_base = val;
        }
        if let Ok(val) = std::env::var("X_BEARER_TOKEN") {
            self.bearer_token = Some(val);
        }
        if let Ok(val) = std::env::var("X_USER_TOKEN") {
            self.user_token = Some(val);
        }
        if let Ok(val) = std::env::var("REPLY_AUTHOR_HANDLE") {
            self.author_handle = val.trim_start_matches('@').to_string();
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// X API v2 client.
#[derive(Clone)]
pub struct XApiClient {
    client: Client,
    api_base: String,
    bearer_token: String,
    user_token: String,
}

impl XApiClient {
    /// Build a client. Both tokens are required.
    pub fn new(config: &PlatformConfig) -> Result<Self, PlatformError> {
        let bearer_token = config
            .bearer_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PlatformError::Config("X_BEARER_TOKEN is not set".to_string()))?;
        let user_token = config
            .user_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PlatformError::Config("X_USER_TOKEN is not set".to_string()))?;

        let client = Client::builder()
            .user_agent(concat!("reply-engine/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PlatformError::Config(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bearer_token,
            user_token,
        })
    }

    /// Turn a non-success response into an error, reading its body.
    async fn check(resp: Response) -> Result<Response, PlatformError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let headers = resp.headers().clone();
        let body = resp.text().await.unwrap_or_default();
        Err(classify_error(status, &headers, &body))
    }
}

#[async_trait::async_trait]
impl Platform for XApiClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, PlatformError> {
        let url = format!("{}/2/tweets/search/recent", self.api_base);
        let max_results = clamp_page_size(request.max_results).to_string();

        let mut params: Vec<(&str, &str)> = vec![
            ("query", request.query.as_str()),
            ("max_results", max_results.as_str()),
            ("tweet.fields", TWEET_FIELDS),
            ("expansions", "author_id"),
            ("user.fields", USER_FIELDS),
        ];
        if let Some(token) = request.next_token.as_deref() {
            params.push(("next_token", token));
        }

        debug!(query = %request.query, "Searching recent posts");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&params)
            .send()
            .await?;
        let resp = Self::check(resp).await?;

        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| PlatformError::Malformed(e.to_string()))?;

        Ok(SearchPage {
            tweets: body.data,
            users: body.includes.users,
            next_token: body.meta.next_token,
        })
    }

    async fn create_reply(&self, text: &str, in_reply_to: &str) -> Result<PostedReply, PlatformError> {
        let url = format!("{}/2/tweets", self.api_base);
        let request = CreateTweetRequest {
            text,
            reply: ReplySettings {
                in_reply_to_tweet_id: in_reply_to,
            },
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.user_token)
            .json(&request)
            .send()
            .await?;
        let resp = Self::check(resp).await?;

        let body: CreateTweetResponse = resp
            .json()
            .await
            .map_err(|e| PlatformError::Malformed(e.to_string()))?;

        debug!(in_reply_to, response_id = %body.data.id, "Posted reply");
        Ok(PostedReply { id: body.data.id })
    }
}

fn clamp_page_size(requested: u32) -> u32 {
    requested.clamp(SEARCH_PAGE_MIN, SEARCH_PAGE_MAX)
}

/// Map an error response to a `PlatformError`.
///
/// HTTP 429 and the `UsageCapExceeded` problem type are quota signals; the
/// wait comes from `retry-after`, falling back to `x-rate-limit-reset`.
fn classify_error(status: StatusCode, headers: &HeaderMap, body: &str) -> PlatformError {
    let problem: ApiProblem = serde_json::from_str(body).unwrap_or_default();
    let usage_cap = problem.title.as_deref() == Some("UsageCapExceeded");

    if status == StatusCode::TOO_MANY_REQUESTS || usage_cap {
        let retry_after = parse_retry_after(header_str(headers, "retry-after"))
            .or_else(|| reset_delay(header_str(headers, "x-rate-limit-reset")));
        warn!(status = status.as_u16(), ?retry_after, "Platform quota exceeded");
        return PlatformError::QuotaExceeded { retry_after };
    }

    let message = problem
        .detail
        .or(problem.title)
        .unwrap_or_else(|| body.chars().take(200).collect());
    PlatformError::Api {
        status: status.as_u16(),
        message,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Seconds until the epoch timestamp in `x-rate-limit-reset`.
fn reset_delay(value: Option<&str>) -> Option<Duration> {
    let reset: i64 = value?.trim().parse().ok()?;
    let remaining = reset - chrono::Utc::now().timestamp();
    Some(Duration::from_secs(remaining.max(0) as u64))
}
