//! Posting responses under the post rate limit.

use std::sync::Arc;

use tracing::{info, warn};

use crate::platform::{Platform, PlatformError};
use crate::rate_limit::{EndpointClass, RateLimiter};

/// Posts one response per call. Never retries: a retried post could
/// duplicate a reply, so retry policy belongs to the caller.
#[derive(Clone)]
pub struct ReplyPoster {
    platform: Arc<dyn Platform>,
    limiter: RateLimiter,
}

impl ReplyPoster {
    pub fn new(platform: Arc<dyn Platform>, limiter: RateLimiter) -> Self {
        Self { platform, limiter }
    }

    /// Post `text` as a reply to `in_reply_to`, returning the new message id.
    pub async fn post_response(&self, text: &str, in_reply_to: &str) -> Result<String, PlatformError> {
        self.limiter.acquire(EndpointClass::Post).await;

        match self.platform.create_reply(text, in_reply_to).await {
            Ok(posted) => {
                self.limiter.report_success(EndpointClass::Post);
                info!(reply_id = in_reply_to, response_id = %posted.id, "Posted response");
                Ok(posted.id)
            }
            Err(e) => {
                self.limiter.report_failure(EndpointClass::Post);
                warn!(reply_id = in_reply_to, "Posting response failed: {}", e);
                Err(e)
            }
        }
    }
}
