//! Diesel row types for the reply tables.

use diesel::prelude::*;

use super::util::{format_timestamp, parse_datetime, parse_datetime_opt};
use crate::models::{ParentMessage, ReplyRecord};
use crate::schema::{parent_messages, reply_records};

/// Reply row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = reply_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ReplyRecordRow {
    pub id: String,
    pub parent_id: String,
    pub author: String,
    pub author_followers: i64,
    pub author_verified: bool,
    pub text: String,
    pub created_at: String,
    pub likes: i64,
    pub retweets: i64,
    pub processed: bool,
    pub response_id: Option<String>,
    pub processed_at: Option<String>,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub updated_at: String,
}

impl From<ReplyRecordRow> for ReplyRecord {
    fn from(row: ReplyRecordRow) -> Self {
        ReplyRecord {
            id: row.id,
            parent_id: row.parent_id,
            author: row.author,
            author_followers: row.author_followers,
            author_verified: row.author_verified,
            text: row.text,
            created_at: parse_datetime(&row.created_at),
            likes: row.likes,
            retweets: row.retweets,
            processed: row.processed,
            response_id: row.response_id,
            processed_at: parse_datetime_opt(row.processed_at),
            retry_count: row.retry_count,
            last_error: row.last_error,
        }
    }
}

/// New reply for insertion. Lifecycle columns take their defaults.
#[derive(Insertable, Debug)]
#[diesel(table_name = reply_records)]
pub struct NewReplyRecord<'a> {
    pub id: &'a str,
    pub parent_id: &'a str,
    pub author: &'a str,
    pub author_followers: i64,
    pub author_verified: bool,
    pub text: &'a str,
    pub created_at: String,
    pub likes: i64,
    pub retweets: i64,
    pub updated_at: &'a str,
}

impl<'a> NewReplyRecord<'a> {
    pub fn new(record: &'a ReplyRecord, now: &'a str) -> Self {
        Self {
            id: &record.id,
            parent_id: &record.parent_id,
            author: &record.author,
            author_followers: record.author_followers,
            author_verified: record.author_verified,
            text: &record.text,
            created_at: format_timestamp(&record.created_at),
            likes: record.likes,
            retweets: record.retweets,
            updated_at: now,
        }
    }
}

/// Parent message row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = parent_messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ParentMessageRow {
    pub id: String,
    pub author_handle: String,
    pub posted_at: String,
    pub created_at: String,
}

impl From<ParentMessageRow> for ParentMessage {
    fn from(row: ParentMessageRow) -> Self {
        ParentMessage {
            id: row.id,
            author_handle: row.author_handle,
            posted_at: parse_datetime(&row.posted_at),
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = parent_messages)]
pub struct NewParentMessage<'a> {
    pub id: &'a str,
    pub author_handle: &'a str,
    pub posted_at: String,
    pub created_at: &'a str,
}
