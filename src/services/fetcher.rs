//! Reply discovery: paginated search, author join, persistence.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::models::ReplyRecord;
use crate::platform::{Platform, PlatformError, SearchPage, SearchRequest, Tweet, User};
use crate::rate_limit::{EndpointClass, RateLimiter};
use crate::repository::{DbError, ReplyStore, UpsertSummary};

/// Largest page the search endpoint serves.
const MAX_PAGE_SIZE: usize = 100;

/// Smallest page the search endpoint serves.
const MIN_PAGE_SIZE: usize = 10;

/// What one `fetch_replies` call gathered.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Replies gathered before pagination ended (already persisted).
    pub replies: Vec<ReplyRecord>,
    /// Pages successfully read.
    pub pages: u32,
    /// Items dropped for a missing author or unreadable timestamp.
    pub skipped: u32,
    pub upserted: UpsertSummary,
    /// The error that cut pagination short, if any.
    pub interruption: Option<PlatformError>,
}

impl FetchOutcome {
    /// Whether the platform refused us for quota; the cycle should stop.
    pub fn is_rate_limited(&self) -> bool {
        self.interruption
            .as_ref()
            .is_some_and(PlatformError::is_quota_exceeded)
    }
}

/// Fetches replies to a parent message and stores them.
#[derive(Clone)]
pub struct ReplyFetcher {
    platform: Arc<dyn Platform>,
    limiter: RateLimiter,
    store: ReplyStore,
}

impl ReplyFetcher {
    pub fn new(platform: Arc<dyn Platform>, limiter: RateLimiter, store: ReplyStore) -> Self {
        Self {
            platform,
            limiter,
            store,
        }
    }

    /// Gather up to `max_results` replies to `parent_id` and upsert them.
    ///
    /// A failing page ends pagination but keeps everything read before it;
    /// the failure is reported in `FetchOutcome::interruption`. Only store
    /// errors are returned as `Err`.
    ///
    /// Pagination also ends on an empty page, a repeated `next_token`, or
    /// after `max_results / 10 + 1` pages, whichever comes first.
    pub async fn fetch_replies(
        &self,
        parent_id: &str,
        author_handle: &str,
        max_results: usize,
    ) -> Result<FetchOutcome, DbError> {
        let query = format!("conversation_id:{parent_id} to:{author_handle}");
        let mut outcome = FetchOutcome::default();
        let mut next_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let max_pages = max_results.div_ceil(MIN_PAGE_SIZE) + 1;

        while outcome.replies.len() < max_results {
            if outcome.pages as usize >= max_pages {
                warn!(parent_id, pages = outcome.pages, "Reply search hit the page cap");
                break;
            }
            let wanted = (max_results - outcome.replies.len()).min(MAX_PAGE_SIZE);
            let request = SearchRequest {
                query: query.clone(),
                max_results: wanted as u32,
                next_token: next_token.take(),
            };

            self.limiter.acquire(EndpointClass::Search).await;
            let page = match self.platform.search(&request).await {
                Ok(page) => {
                    self.limiter.report_success(EndpointClass::Search);
                    page
                }
                Err(e) => {
                    self.limiter.report_failure(EndpointClass::Search);
                    warn!(
                        parent_id,
                        page = outcome.pages + 1,
                        "Reply search failed, keeping {} replies from earlier pages: {}",
                        outcome.replies.len(),
                        e
                    );
                    outcome.interruption = Some(e);
                    break;
                }
            };

            outcome.pages += 1;
            collect_page(parent_id, &page, &mut outcome);
            if page.tweets.is_empty() {
                break;
            }

            match page.next_token {
                Some(token) if seen_tokens.insert(token.clone()) => next_token = Some(token),
                Some(token) => {
                    warn!(parent_id, token = %token, "Reply search returned a repeated page token");
                    break;
                }
                None => break,
            }
        }
        outcome.replies.truncate(max_results);

        outcome.upserted = self.store.upsert_replies(&outcome.replies).await?;
        info!(
            parent_id,
            fetched = outcome.replies.len(),
            new = outcome.upserted.inserted,
            stored = outcome.upserted.total(),
            pages = outcome.pages,
            "Fetched replies"
        );
        Ok(outcome)
    }
}

fn collect_page(parent_id: &str, page: &SearchPage, outcome: &mut FetchOutcome) {
    for tweet in &page.tweets {
        let Some(author) = page.author(tweet) else {
            warn!(parent_id, reply_id = %tweet.id, "Skipping reply with no author in expansion");
            outcome.skipped += 1;
            continue;
        };
        match to_reply(parent_id, tweet, author) {
            Some(reply) => outcome.replies.push(reply),
            None => {
                warn!(parent_id, reply_id = %tweet.id, "Skipping reply with unreadable created_at");
                outcome.skipped += 1;
            }
        }
    }
    debug!(
        parent_id,
        items = page.tweets.len(),
        has_next = page.next_token.is_some(),
        "Read search page"
    );
}

fn to_reply(parent_id: &str, tweet: &Tweet, author: &User) -> Option<ReplyRecord> {
    let created_at = DateTime::parse_from_rfc3339(tweet.created_at.as_deref()?)
        .ok()?
        .with_timezone(&Utc);

    Some(
        ReplyRecord::discovered(&tweet.id, parent_id, &author.username, &tweet.text, created_at)
            .with_metrics(
                tweet.public_metrics.like_count,
                tweet.public_metrics.retweet_count,
            )
            .with_author_profile(author.public_metrics.followers_count, author.verified),
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::platform::{
        Platform, PlatformError, PostedReply, SearchPage, SearchRequest, Tweet, TweetMetrics,
        User, UserMetrics,
    };
    use crate::rate_limit::{RateLimitConfig, RateLimiter, WindowConfig};

    /// Limiter that never sleeps.
    pub fn unthrottled_limiter() -> RateLimiter {
        let open = |base: WindowConfig| WindowConfig {
            hard_quota: 10_000,
            min_interval_ms: Some(0),
            max_jitter_ms: 0,
            ..base
        };
        RateLimiter::new(RateLimitConfig {
            search: open(WindowConfig::search_default()),
            post: open(WindowConfig::post_default()),
            ..RateLimitConfig::default()
        })
    }

    pub fn tweet(id: &str, author_id: &str, created_at: &str, likes: i64) -> Tweet {
        Tweet {
            id: id.to_string(),
            text: format!("reply {id}"),
            author_id: Some(author_id.to_string()),
            created_at: Some(created_at.to_string()),
            conversation_id: None,
            public_metrics: TweetMetrics {
                like_count: likes,
                ..TweetMetrics::default()
            },
        }
    }

    pub fn user(id: &str, username: &str) -> User {
        User {
            id: id.to_string(),
            username: username.to_string(),
            verified: false,
            public_metrics: UserMetrics { followers_count: 10 },
        }
    }

    /// Platform that replays scripted search results and records calls.
    #[derive(Default)]
    pub struct ScriptedPlatform {
        pub pages: Mutex<VecDeque<Result<SearchPage, PlatformError>>>,
        pub searches: Mutex<Vec<SearchRequest>>,
        pub posts: Mutex<Vec<(String, String)>>,
        pub post_results: Mutex<VecDeque<Result<PostedReply, PlatformError>>>,
    }

    impl ScriptedPlatform {
        pub fn with_pages(pages: Vec<Result<SearchPage, PlatformError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Platform for ScriptedPlatform {
        async fn search(&self, request: &SearchRequest) -> Result<SearchPage, PlatformError> {
            self.searches.lock().unwrap().push(request.clone());
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(SearchPage::default()))
        }

        async fn create_reply(
            &self,
            text: &str,
            in_reply_to: &str,
        ) -> Result<PostedReply, PlatformError> {
            let mut posts = self.posts.lock().unwrap();
            posts.push((text.to_string(), in_reply_to.to_string()));
            let n = posts.len();
            drop(posts);
            self.post_results.lock().unwrap().pop_front().unwrap_or_else(|| {
                Ok(PostedReply {
                    id: format!("posted-{n}"),
                })
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::repository::reply::test_support::setup_store;

    fn page(tweets: Vec<Tweet>, next: Option<&str>) -> Result<SearchPage, PlatformError> {
        Ok(SearchPage {
            tweets,
            users: vec![user("u1", "alice"), user("u2", "bob")],
            next_token: next.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_failed_second_page_keeps_first() {
        let (store, _dir) = setup_store().await;
        let platform = Arc::new(ScriptedPlatform::with_pages(vec![
            page(
                vec![
                    tweet("r1", "u1", "2024-11-25T14:00:00.000Z", 2),
                    tweet("r2", "u2", "2024-11-25T14:01:00.000Z", 5),
                ],
                Some("page2"),
            ),
            Err(PlatformError::Network("connection reset".into())),
            page(vec![tweet("r3", "u1", "2024-11-25T14:02:00.000Z", 0)], None),
        ]));
        let fetcher = ReplyFetcher::new(platform.clone(), unthrottled_limiter(), store.clone());

        let outcome = fetcher.fetch_replies("P", "somebot", 100).await.unwrap();

        assert_eq!(outcome.pages, 1);
        assert_eq!(outcome.replies.len(), 2);
        assert_eq!(outcome.upserted.inserted, 2);
        assert!(matches!(outcome.interruption, Some(PlatformError::Network(_))));
        assert!(!outcome.is_rate_limited());

        let stored = store.list_unprocessed("P").await.unwrap();
        let ids: Vec<&str> = stored.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
        assert_eq!(stored[0].likes, 2);

        let searches = platform.searches.lock().unwrap();
        assert_eq!(searches.len(), 2);
        assert_eq!(searches[0].query, "conversation_id:P to:somebot");
        assert_eq!(searches[0].next_token, None);
        assert_eq!(searches[1].next_token.as_deref(), Some("page2"));
    }

    #[tokio::test]
    async fn test_quota_on_search_is_rate_limited() {
        let (store, _dir) = setup_store().await;
        let platform = Arc::new(ScriptedPlatform::with_pages(vec![Err(
            PlatformError::QuotaExceeded { retry_after: None },
        )]));
        let limiter = unthrottled_limiter();
        let fetcher = ReplyFetcher::new(platform, limiter.clone(), store);

        let outcome = fetcher.fetch_replies("P", "somebot", 100).await.unwrap();

        assert!(outcome.is_rate_limited());
        assert!(outcome.replies.is_empty());
        assert_eq!(limiter.consecutive_failures(EndpointClass::Search), 1);
    }

    #[tokio::test]
    async fn test_skips_items_without_author_or_timestamp() {
        let (store, _dir) = setup_store().await;
        let mut no_time = tweet("r3", "u1", "", 0);
        no_time.created_at = None;
        let platform = Arc::new(ScriptedPlatform::with_pages(vec![page(
            vec![
                tweet("r1", "u1", "2024-11-25T14:00:00.000Z", 0),
                tweet("r2", "ghost", "2024-11-25T14:01:00.000Z", 0),
                no_time,
                tweet("r4", "u2", "yesterday", 0),
            ],
            None,
        )]));
        let fetcher = ReplyFetcher::new(platform, unthrottled_limiter(), store);

        let outcome = fetcher.fetch_replies("P", "somebot", 100).await.unwrap();

        assert_eq!(outcome.skipped, 3);
        assert_eq!(outcome.replies.len(), 1);
        assert_eq!(outcome.replies[0].author, "alice");
        assert!(outcome.interruption.is_none());
    }

    #[tokio::test]
    async fn test_stops_at_max_results() {
        let (store, _dir) = setup_store().await;
        let platform = Arc::new(ScriptedPlatform::with_pages(vec![
            page(
                vec![
                    tweet("r1", "u1", "2024-11-25T14:00:00.000Z", 0),
                    tweet("r2", "u1", "2024-11-25T14:01:00.000Z", 0),
                    tweet("r3", "u1", "2024-11-25T14:02:00.000Z", 0),
                ],
                Some("more"),
            ),
            page(vec![tweet("r4", "u1", "2024-11-25T14:03:00.000Z", 0)], None),
        ]));
        let fetcher = ReplyFetcher::new(platform.clone(), unthrottled_limiter(), store);

        let outcome = fetcher.fetch_replies("P", "somebot", 2).await.unwrap();

        assert_eq!(outcome.replies.len(), 2);
        assert_eq!(platform.searches.lock().unwrap().len(), 1);
        assert_eq!(platform.searches.lock().unwrap()[0].max_results, 2);
    }

    #[tokio::test]
    async fn test_empty_page_with_token_ends_pagination() {
        let (store, _dir) = setup_store().await;
        let pages = (0..500).map(|_| page(vec![], Some("again"))).collect();
        let platform = Arc::new(ScriptedPlatform::with_pages(pages));
        let fetcher = ReplyFetcher::new(platform.clone(), unthrottled_limiter(), store);

        let outcome = fetcher.fetch_replies("P", "somebot", 10).await.unwrap();

        assert!(outcome.replies.is_empty());
        assert_eq!(outcome.pages, 1);
        assert_eq!(platform.searches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_token_ends_pagination() {
        let (store, _dir) = setup_store().await;
        let pages = (0..50)
            .map(|i| {
                page(
                    vec![tweet(&format!("r{i}"), "ghost", "2024-11-25T14:00:00.000Z", 0)],
                    Some("same"),
                )
            })
            .collect();
        let platform = Arc::new(ScriptedPlatform::with_pages(pages));
        let fetcher = ReplyFetcher::new(platform.clone(), unthrottled_limiter(), store);

        let outcome = fetcher.fetch_replies("P", "somebot", 100).await.unwrap();

        assert_eq!(outcome.skipped, 2);
        assert_eq!(platform.searches.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_page_cap_bounds_skipped_pages() {
        let (store, _dir) = setup_store().await;
        let pages = (0..500)
            .map(|i| {
                page(
                    vec![tweet(&format!("r{i}"), "ghost", "2024-11-25T14:00:00.000Z", 0)],
                    Some(&format!("t{i}")),
                )
            })
            .collect();
        let platform = Arc::new(ScriptedPlatform::with_pages(pages));
        let fetcher = ReplyFetcher::new(platform.clone(), unthrottled_limiter(), store);

        let outcome = fetcher.fetch_replies("P", "somebot", 10).await.unwrap();

        assert!(outcome.replies.is_empty());
        assert_eq!(outcome.pages, 2);
        assert_eq!(platform.searches.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_maps_metrics_and_author_profile() {
        let (store, _dir) = setup_store().await;
        let mut verified = user("u1", "alice");
        verified.verified = true;
        verified.public_metrics.followers_count = 1200;
        let mut t = tweet("r1", "u1", "2024-11-25T14:00:00.000Z", 7);
        t.public_metrics.retweet_count = 3;
        let platform = Arc::new(ScriptedPlatform::with_pages(vec![Ok(SearchPage {
            tweets: vec![t],
            users: vec![verified],
            next_token: None,
        })]));
        let fetcher = ReplyFetcher::new(platform, unthrottled_limiter(), store.clone());

        fetcher.fetch_replies("P", "somebot", 10).await.unwrap();

        let r1 = store.get("r1").await.unwrap().unwrap();
        assert_eq!(r1.parent_id, "P");
        assert_eq!((r1.likes, r1.retweets), (7, 3));
        assert_eq!(r1.author_followers, 1200);
        assert!(r1.author_verified);
        assert_eq!(r1.created_at.to_rfc3339(), "2024-11-25T14:00:00+00:00");
    }
}
