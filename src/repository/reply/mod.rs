//! Reply store: the only writer of reply lifecycle state.
//!
//! Every state transition is a single conditional `UPDATE` guarded by
//! `processed = false`, so concurrent workers and restarted runs can never
//! reset or double-apply a transition.

mod parents;
mod replies;

use serde::Serialize;

use super::pool::DbPool;

/// Result of persisting a batch of fetched replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    /// Rows that did not exist before.
    pub inserted: u64,
    /// Existing rows whose counters and author profile were refreshed.
    pub refreshed: u64,
}

impl UpsertSummary {
    pub fn total(&self) -> u64 {
        self.inserted + self.refreshed
    }
}

/// Outcome of a terminal transition (`mark_processed` or `abandon`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// This call performed the false→true transition.
    Marked,
    /// The row was already processed; nothing changed.
    AlreadyProcessed,
}

/// Diesel-backed store for replies and tracked parent messages.
#[derive(Clone)]
pub struct ReplyStore {
    pool: DbPool,
}

impl ReplyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::ReplyStore;
    use crate::repository::DbContext;
    use tempfile::TempDir;

    /// Store backed by a fresh SQLite file in a temp dir.
    pub async fn setup_store() -> (ReplyStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("replies.db"));
        ctx.init_schema().await.unwrap();
        (ctx.replies(), dir)
    }
}
