//! SQLite pool construction for the ledger database.

use std::path::Path;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::{DataError, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the ledger database at `path`.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the database
/// cannot be opened.
pub async fn open_pool(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| DataError::Io {
            operation: "pool.create_dir",
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(DataError::query("pool.connect"))
}
