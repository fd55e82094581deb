//! Database context: owns the pool and hands out stores.

use std::path::Path;

use diesel_async::SimpleAsyncConnection;

use super::pool::{DbError, DbPool};
use super::reply::ReplyStore;

/// Entry point for all database access.
///
/// ```ignore
/// let ctx = DbContext::from_url("sqlite:replies.db")?;
/// ctx.init_schema().await?;
/// let pending = ctx.replies().list_unprocessed("1861234567890").await?;
/// ```
#[derive(Clone)]
pub struct DbContext {
    pool: DbPool,
}

impl DbContext {
    /// Create a context from a database file path (SQLite only).
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: DbPool::sqlite_from_path(db_path),
        }
    }

    /// Create a context from a database URL.
    ///
    /// Supports:
    /// - SQLite: file paths or `sqlite:` URLs
    /// - PostgreSQL: `postgres://` or `postgresql://` URLs
    pub fn from_url(url: &str) -> Result<Self, DbError> {
        Ok(Self {
            pool: DbPool::from_url(url)?,
        })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Get a reply store.
    pub fn replies(&self) -> ReplyStore {
        ReplyStore::new(self.pool.clone())
    }

    /// Create tables and indexes. Safe to run repeatedly.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        crate::with_conn_split!(self.pool,
            sqlite: conn => {
                init_sqlite_schema(&mut conn).await
            },
            postgres: conn => {
                init_postgres_schema(&mut conn).await
            }
        )
    }
}

async fn init_sqlite_schema(conn: &mut super::pool::SqliteConn) -> Result<(), DbError> {
    conn.batch_execute(include_str!("schema_sqlite.sql")).await
}

#[cfg(feature = "postgres")]
async fn init_postgres_schema(conn: &mut diesel_async::AsyncPgConnection) -> Result<(), DbError> {
    use diesel_async::RunQueryDsl;

    // PostgreSQL needs statements executed separately
    let statements = include_str!("schema_postgres.sql");
    for stmt in statements.split(';') {
        let stmt = stmt.trim();
        if !stmt.is_empty() && !stmt.starts_with("--") {
            diesel::sql_query(stmt).execute(conn).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("replies.db"));

        ctx.init_schema().await.unwrap();
        ctx.init_schema().await.unwrap();

        let stats = ctx.replies().stats(None).await.unwrap();
        assert_eq!(stats.total, 0);
    }
}
