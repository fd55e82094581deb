//! Parent messages: our own posts whose replies we answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Marker the platform client used to leave in place of a status URL when a
/// post was rejected.
const RATE_LIMIT_MARKER: &str = "Too Many Requests";

/// A message posted by the bot that the pipeline monitors for replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentMessage {
    pub id: String,
    /// Handle the message was posted under (scopes the reply search).
    pub author_handle: String,
    pub posted_at: DateTime<Utc>,
}

impl ParentMessage {
    pub fn new(id: impl Into<String>, author_handle: impl Into<String>, posted_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            author_handle: author_handle.into(),
            posted_at,
        }
    }
}

/// Extract a status id from either a bare id or a status URL
/// (`https://x.com/<handle>/status/<id>`).
///
/// Returns None for error strings stored where a URL was expected.
pub fn parse_status_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() || input.contains(RATE_LIMIT_MARKER) {
        return None;
    }
    if input.bytes().all(|b| b.is_ascii_digit()) {
        return Some(input.to_string());
    }

    let url = Url::parse(input).ok()?;
    let mut segments = url.path_segments()?;
    segments.find(|s| *s == "status")?;
    let id = segments.next()?;
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Some(id.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_id() {
        assert_eq!(
            parse_status_id("https://x.com/somebot/status/1861234567890"),
            Some("1861234567890".to_string())
        );
        assert_eq!(
            parse_status_id("https://twitter.com/somebot/status/42?s=20"),
            Some("42".to_string())
        );
        assert_eq!(parse_status_id("  1861234567890 "), Some("1861234567890".to_string()));
    }

    #[test]
    fn test_parse_status_id_rejects_garbage() {
        assert_eq!(parse_status_id(""), None);
        assert_eq!(parse_status_id("Error posting tweet: 429 Too Many Requests"), None);
        assert_eq!(parse_status_id("https://x.com/somebot"), None);
        assert_eq!(parse_status_id("https://x.com/somebot/status/abc"), None);
        assert_eq!(parse_status_id("not a url"), None);
    }
}
