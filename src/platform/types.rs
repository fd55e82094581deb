//! Wire types for the X API v2 endpoints we call.

use serde::{Deserialize, Serialize};

/// A post as returned by `/2/tweets/search/recent`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
    /// RFC 3339 timestamp. Parsed by the caller so one bad item can be skipped.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub public_metrics: TweetMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TweetMetrics {
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub retweet_count: i64,
}

/// User object from the `author_id` expansion.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub public_metrics: UserMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserMetrics {
    #[serde(default)]
    pub followers_count: i64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Includes {
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchMeta {
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Body of a search response. `data` is absent when nothing matched.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub data: Vec<Tweet>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub meta: SearchMeta,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateTweetRequest<'a> {
    pub text: &'a str,
    pub reply: ReplySettings<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReplySettings<'a> {
    pub in_reply_to_tweet_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateTweetResponse {
    pub data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedTweet {
    pub id: String,
}

/// Problem body returned on errors (`title` is e.g. "UsageCapExceeded").
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiProblem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}
