//! Throwaway SQLite pools for ledger tests.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// In-memory database shared by every query on the returned pool.
///
/// Each SQLite connection to `:memory:` is its own database, so the pool is
/// pinned to a single connection that never expires.
///
/// # Errors
///
/// Returns an error if the connection cannot be opened.
pub async fn memory_pool() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_pool_keeps_state_between_queries() -> Result<(), sqlx::Error> {
        let pool = memory_pool().await?;
        sqlx::query("CREATE TABLE scratch (value INTEGER)")
            .execute(&pool)
            .await?;
        sqlx::query("INSERT INTO scratch (value) VALUES (7)")
            .execute(&pool)
            .await?;
        let (value,): (i64,) = sqlx::query_as("SELECT value FROM scratch")
            .fetch_one(&pool)
            .await?;
        assert_eq!(value, 7);
        Ok(())
    }
}
