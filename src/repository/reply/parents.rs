//! Tracked parent messages.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::ReplyStore;
use crate::models::ParentMessage;
use crate::repository::models::{NewParentMessage, ParentMessageRow};
use crate::repository::pool::DbError;
use crate::repository::util::format_timestamp;
use crate::schema::parent_messages;
use crate::with_conn;

impl ReplyStore {
    /// Start monitoring a parent message. Returns false if it was already tracked.
    pub async fn track_parent(&self, parent: &ParentMessage) -> Result<bool, DbError> {
        let now = format_timestamp(&Utc::now());
        let row = NewParentMessage {
            id: &parent.id,
            author_handle: &parent.author_handle,
            posted_at: format_timestamp(&parent.posted_at),
            created_at: &now,
        };

        with_conn!(self.pool, conn => {
            let inserted = diesel::insert_into(parent_messages::table)
                .values(&row)
                .on_conflict(parent_messages::id)
                .do_nothing()
                .execute(&mut conn)
                .await?;
            Ok(inserted > 0)
        })
    }

    /// Parents posted at or after `since`, newest first.
    pub async fn list_recent_parents(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ParentMessage>, DbError> {
        let since = format_timestamp(&since);

        with_conn!(self.pool, conn => {
            parent_messages::table
                .filter(parent_messages::posted_at.ge(&since))
                .order(parent_messages::posted_at.desc())
                .select(ParentMessageRow::as_select())
                .load::<ParentMessageRow>(&mut conn)
                .await
                .map(|rows| rows.into_iter().map(ParentMessage::from).collect())
        })
    }
}
