//! Reply lifecycle operations.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use super::{MarkOutcome, ReplyStore, UpsertSummary};
use crate::models::{ReplyRecord, ReplyStats};
use crate::repository::models::{NewReplyRecord, ReplyRecordRow};
use crate::repository::pool::DbError;
use crate::repository::util::format_timestamp;
use crate::schema::reply_records;
use crate::with_conn;

impl ReplyStore {
    /// Persist fetched replies.
    ///
    /// New ids are inserted unprocessed. Known ids get their engagement
    /// counters and author profile refreshed; `processed`, `response_id`,
    /// `processed_at` and `retry_count` are never part of that update.
    pub async fn upsert_replies(&self, replies: &[ReplyRecord]) -> Result<UpsertSummary, DbError> {
        if replies.is_empty() {
            return Ok(UpsertSummary::default());
        }
        let now = format_timestamp(&Utc::now());

        with_conn!(self.pool, conn => {
            let mut summary = UpsertSummary::default();
            for reply in replies {
                let row = NewReplyRecord::new(reply, &now);
                let inserted = diesel::insert_into(reply_records::table)
                    .values(&row)
                    .on_conflict(reply_records::id)
                    .do_nothing()
                    .execute(&mut conn)
                    .await?;
                if inserted > 0 {
                    summary.inserted += 1;
                    continue;
                }

                let refreshed = diesel::update(reply_records::table.find(&reply.id))
                    .set((
                        reply_records::author.eq(&reply.author),
                        reply_records::author_followers.eq(reply.author_followers),
                        reply_records::author_verified.eq(reply.author_verified),
                        reply_records::likes.eq(reply.likes),
                        reply_records::retweets.eq(reply.retweets),
                        reply_records::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?;
                summary.refreshed += refreshed as u64;
            }
            debug!(
                inserted = summary.inserted,
                refreshed = summary.refreshed,
                "Upserted replies"
            );
            Ok(summary)
        })
    }

    /// Unprocessed replies to `parent_id`, oldest first (ties broken by id).
    pub async fn list_unprocessed(&self, parent_id: &str) -> Result<Vec<ReplyRecord>, DbError> {
        with_conn!(self.pool, conn => {
            reply_records::table
                .filter(reply_records::parent_id.eq(parent_id))
                .filter(reply_records::processed.eq(false))
                .order((reply_records::created_at.asc(), reply_records::id.asc()))
                .select(ReplyRecordRow::as_select())
                .load::<ReplyRecordRow>(&mut conn)
                .await
                .map(|rows| rows.into_iter().map(ReplyRecord::from).collect())
        })
    }

    /// Record that `response_id` was posted in answer to reply `id`.
    ///
    /// Only the first call for an id has any effect; later calls report
    /// `AlreadyProcessed`. Unknown ids are `NotFound`.
    pub async fn mark_processed(
        &self,
        id: &str,
        response_id: &str,
        at: DateTime<Utc>,
    ) -> Result<MarkOutcome, DbError> {
        let at = format_timestamp(&at);

        with_conn!(self.pool, conn => {
            let updated = diesel::update(
                reply_records::table
                    .filter(reply_records::id.eq(id))
                    .filter(reply_records::processed.eq(false)),
            )
            .set((
                reply_records::processed.eq(true),
                reply_records::response_id.eq(Some(response_id)),
                reply_records::processed_at.eq(Some(&at)),
                reply_records::updated_at.eq(&at),
            ))
            .execute(&mut conn)
            .await?;

            if updated > 0 {
                return Ok(MarkOutcome::Marked);
            }
            let exists: i64 = reply_records::table
                .filter(reply_records::id.eq(id))
                .count()
                .get_result(&mut conn)
                .await?;
            if exists > 0 {
                Ok(MarkOutcome::AlreadyProcessed)
            } else {
                Err(DbError::NotFound)
            }
        })
    }

    /// Close a reply without a response (retry cap reached).
    ///
    /// Sets `processed` with a null `response_id`. Same idempotence as
    /// `mark_processed`.
    pub async fn abandon(&self, id: &str, at: DateTime<Utc>) -> Result<MarkOutcome, DbError> {
        let at = format_timestamp(&at);

        with_conn!(self.pool, conn => {
            let updated = diesel::update(
                reply_records::table
                    .filter(reply_records::id.eq(id))
                    .filter(reply_records::processed.eq(false)),
            )
            .set((
                reply_records::processed.eq(true),
                reply_records::processed_at.eq(Some(&at)),
                reply_records::updated_at.eq(&at),
            ))
            .execute(&mut conn)
            .await?;

            if updated > 0 {
                Ok(MarkOutcome::Marked)
            } else {
                Ok(MarkOutcome::AlreadyProcessed)
            }
        })
    }

    /// Count a failed attempt against an unprocessed reply.
    ///
    /// Returns the new retry count, or None if the reply is unknown or
    /// already processed.
    pub async fn increment_retry(&self, id: &str, reason: &str) -> Result<Option<i32>, DbError> {
        let now = format_timestamp(&Utc::now());

        with_conn!(self.pool, conn => {
            let updated = diesel::update(
                reply_records::table
                    .filter(reply_records::id.eq(id))
                    .filter(reply_records::processed.eq(false)),
            )
            .set((
                reply_records::retry_count.eq(reply_records::retry_count + 1),
                reply_records::last_error.eq(Some(reason)),
                reply_records::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;

            if updated == 0 {
                return Ok(None);
            }
            reply_records::table
                .find(id)
                .select(reply_records::retry_count)
                .first::<i32>(&mut conn)
                .await
                .optional()
        })
    }

    /// Get a reply by id.
    pub async fn get(&self, id: &str) -> Result<Option<ReplyRecord>, DbError> {
        with_conn!(self.pool, conn => {
            reply_records::table
                .find(id)
                .select(ReplyRecordRow::as_select())
                .first::<ReplyRecordRow>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(ReplyRecord::from))
        })
    }

    /// Lifecycle counts, for one parent or across all of them.
    pub async fn stats(&self, parent_id: Option<&str>) -> Result<ReplyStats, DbError> {
        let rows: Vec<(bool, Option<String>)> = with_conn!(self.pool, conn => {
            let mut query = reply_records::table
                .select((reply_records::processed, reply_records::response_id))
                .into_boxed();
            if let Some(pid) = parent_id {
                query = query.filter(reply_records::parent_id.eq(pid));
            }
            query.load(&mut conn).await?
        });

        let mut stats = ReplyStats::default();
        for (processed, response_id) in rows {
            stats.total += 1;
            match (processed, response_id.is_some()) {
                (false, _) => stats.unprocessed += 1,
                (true, true) => stats.responded += 1,
                (true, false) => stats.abandoned += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::models::ProcessingState;
    use crate::repository::reply::test_support::setup_store;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 3, 12, minute, 0).unwrap()
    }

    fn reply(id: &str, parent: &str, minute: u32, likes: i64) -> ReplyRecord {
        ReplyRecord::discovered(id, parent, "alice", format!("reply {id}"), at(minute))
            .with_metrics(likes, 0)
    }

    #[tokio::test]
    async fn test_refetch_after_processing_updates_counters_only() {
        let (store, _dir) = setup_store().await;

        let summary = store
            .upsert_replies(&[reply("r1", "P", 1, 2), reply("r2", "P", 2, 5)])
            .await
            .unwrap();
        assert_eq!(summary.inserted, 2);
        for id in ["r1", "r2"] {
            let row = store.get(id).await.unwrap().unwrap();
            assert!(!row.processed);
            assert_eq!(row.response_id, None);
        }

        let outcome = store.mark_processed("r1", "X", at(10)).await.unwrap();
        assert_eq!(outcome, MarkOutcome::Marked);

        let summary = store.upsert_replies(&[reply("r1", "P", 1, 9)]).await.unwrap();
        assert_eq!(summary, UpsertSummary { inserted: 0, refreshed: 1 });

        let r1 = store.get("r1").await.unwrap().unwrap();
        assert_eq!(r1.likes, 9);
        assert!(r1.processed);
        assert_eq!(r1.response_id.as_deref(), Some("X"));
        assert_eq!(r1.processed_at, Some(at(10)));
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_single_unprocessed_row() {
        let (store, _dir) = setup_store().await;
        let r = reply("r1", "P", 1, 2);

        store.upsert_replies(&[r.clone()]).await.unwrap();
        store.increment_retry("r1", "timeout").await.unwrap();
        let summary = store.upsert_replies(&[r.with_metrics(3, 1)]).await.unwrap();
        assert_eq!(summary.refreshed, 1);

        let row = store.get("r1").await.unwrap().unwrap();
        assert_eq!(row.likes, 3);
        assert_eq!(row.retweets, 1);
        assert_eq!(row.retry_count, 1);
        assert!(!row.processed);
        assert_eq!(store.stats(None).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_list_unprocessed_orders_by_creation() {
        let (store, _dir) = setup_store().await;
        store
            .upsert_replies(&[
                reply("c", "P", 30, 0),
                reply("a", "P", 10, 0),
                reply("b", "P", 20, 0),
                reply("other", "Q", 5, 0),
            ])
            .await
            .unwrap();

        let ids: Vec<String> = store
            .list_unprocessed("P")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        store.mark_processed("b", "resp-b", at(40)).await.unwrap();
        let ids: Vec<String> = store
            .list_unprocessed("P")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_ordering_survives_subsecond_timestamps() {
        let (store, _dir) = setup_store().await;
        let base = at(0);
        let mut later = reply("later", "P", 0, 0);
        later.created_at = base + Duration::milliseconds(500);
        let earlier = reply("earlier", "P", 0, 0);

        store.upsert_replies(&[later, earlier]).await.unwrap();
        let ids: Vec<String> = store
            .list_unprocessed("P")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["earlier", "later"]);
    }

    #[tokio::test]
    async fn test_mark_processed_is_idempotent() {
        let (store, _dir) = setup_store().await;
        store.upsert_replies(&[reply("r1", "P", 1, 0)]).await.unwrap();

        assert_eq!(
            store.mark_processed("r1", "first", at(5)).await.unwrap(),
            MarkOutcome::Marked
        );
        assert_eq!(
            store.mark_processed("r1", "second", at(6)).await.unwrap(),
            MarkOutcome::AlreadyProcessed
        );

        let row = store.get("r1").await.unwrap().unwrap();
        assert_eq!(row.response_id.as_deref(), Some("first"));
        assert_eq!(row.state(), ProcessingState::Processed);

        let missing = store.mark_processed("nope", "x", at(7)).await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn test_three_generation_failures_count_retries() {
        let (store, _dir) = setup_store().await;
        store
            .upsert_replies(&[reply("r1", "P", 1, 2), reply("r2", "P", 2, 5)])
            .await
            .unwrap();

        for expected in 1..=3 {
            let count = store.increment_retry("r2", "generation failed").await.unwrap();
            assert_eq!(count, Some(expected));
        }

        let r2 = store.get("r2").await.unwrap().unwrap();
        assert_eq!(r2.retry_count, 3);
        assert!(!r2.processed);
        assert_eq!(r2.response_id, None);
        assert_eq!(r2.last_error.as_deref(), Some("generation failed"));
    }

    #[tokio::test]
    async fn test_increment_retry_ignores_processed_and_unknown() {
        let (store, _dir) = setup_store().await;
        store.upsert_replies(&[reply("r1", "P", 1, 0)]).await.unwrap();
        store.mark_processed("r1", "X", at(2)).await.unwrap();

        assert_eq!(store.increment_retry("r1", "late").await.unwrap(), None);
        assert_eq!(store.increment_retry("ghost", "late").await.unwrap(), None);
        assert_eq!(store.get("r1").await.unwrap().unwrap().retry_count, 0);
    }

    #[tokio::test]
    async fn test_abandon_and_stats() {
        let (store, _dir) = setup_store().await;
        store
            .upsert_replies(&[
                reply("r1", "P", 1, 0),
                reply("r2", "P", 2, 0),
                reply("r3", "P", 3, 0),
                reply("q1", "Q", 1, 0),
            ])
            .await
            .unwrap();

        store.mark_processed("r1", "X", at(5)).await.unwrap();
        assert_eq!(store.abandon("r2", at(6)).await.unwrap(), MarkOutcome::Marked);
        assert_eq!(
            store.abandon("r2", at(7)).await.unwrap(),
            MarkOutcome::AlreadyProcessed
        );
        // Abandon never overwrites a posted response.
        assert_eq!(
            store.abandon("r1", at(7)).await.unwrap(),
            MarkOutcome::AlreadyProcessed
        );

        let r2 = store.get("r2").await.unwrap().unwrap();
        assert_eq!(r2.state(), ProcessingState::Abandoned);

        let p = store.stats(Some("P")).await.unwrap();
        assert_eq!(
            p,
            ReplyStats {
                total: 3,
                unprocessed: 1,
                responded: 1,
                abandoned: 1,
            }
        );
        assert_eq!(store.stats(None).await.unwrap().total, 4);
    }

    #[tokio::test]
    async fn test_concurrent_marks_transition_once() {
        let (store, _dir) = setup_store().await;
        store.upsert_replies(&[reply("r1", "P", 1, 0)]).await.unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .mark_processed("r1", &format!("resp-{i}"), at(9))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut marked = 0;
        for handle in handles {
            if handle.await.unwrap() == MarkOutcome::Marked {
                marked += 1;
            }
        }
        assert_eq!(marked, 1);
    }
}
