//! Reply records discovered on the platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a reply sits in its lifecycle.
///
/// There is no persisted in-flight state: a reply being answered is still
/// `Discovered` until `mark_processed` lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    /// Stored, not yet answered.
    Discovered,
    /// Answered; `response_id` points at our reply.
    Processed,
    /// Closed without a response after exhausting retries.
    Abandoned,
}

/// One reply to a parent message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRecord {
    /// Platform message id (primary key, immutable).
    pub id: String,
    /// Id of the message being replied to.
    pub parent_id: String,
    pub author: String,
    pub author_followers: i64,
    pub author_verified: bool,
    pub text: String,
    /// Platform creation timestamp.
    pub created_at: DateTime<Utc>,
    pub likes: i64,
    pub retweets: i64,
    pub processed: bool,
    /// Id of the response we posted. Set together with `processed`.
    pub response_id: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    /// Reason for the most recent generation or posting failure.
    pub last_error: Option<String>,
}

impl ReplyRecord {
    /// A freshly sighted reply with zeroed counters.
    pub fn discovered(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        author: impl Into<String>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            author: author.into(),
            author_followers: 0,
            author_verified: false,
            text: text.into(),
            created_at,
            likes: 0,
            retweets: 0,
            processed: false,
            response_id: None,
            processed_at: None,
            retry_count: 0,
            last_error: None,
        }
    }

    pub fn with_metrics(mut self, likes: i64, retweets: i64) -> Self {
        self.likes = likes;
        self.retweets = retweets;
        self
    }

    pub fn with_author_profile(mut self, followers: i64, verified: bool) -> Self {
        self.author_followers = followers;
        self.author_verified = verified;
        self
    }

    pub fn state(&self) -> ProcessingState {
        match (self.processed, &self.response_id) {
            (false, _) => ProcessingState::Discovered,
            (true, Some(_)) => ProcessingState::Processed,
            (true, None) => ProcessingState::Abandoned,
        }
    }
}

/// Row counts for a parent (or the whole table).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplyStats {
    pub total: u64,
    pub unprocessed: u64,
    pub responded: u64,
    pub abandoned: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_follows_processed_and_response() {
        let mut reply = ReplyRecord::discovered("1", "0", "alice", "hi", Utc::now());
        assert_eq!(reply.state(), ProcessingState::Discovered);

        reply.processed = true;
        assert_eq!(reply.state(), ProcessingState::Abandoned);

        reply.response_id = Some("99".to_string());
        assert_eq!(reply.state(), ProcessingState::Processed);
    }
}
