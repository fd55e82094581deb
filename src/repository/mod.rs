//! Repository layer for database persistence.
//!
//! All database access goes through Diesel. SQLite by default, PostgreSQL
//! with the `postgres` feature.

pub mod context;
pub mod models;
pub mod pool;
pub mod reply;
pub mod util;

pub use context::DbContext;
pub use pool::{DbError, DbPool};
pub use reply::{MarkOutcome, ReplyStore, UpsertSummary};
