//! Per-service transfer ledger backed by SQLite.
//!
//! # Design
//! - One store instance is bound to one service table at construction.
//! - Multi-statement operations run inside an explicit transaction.
//! - Reads tolerate NULL flags left by databases created by earlier releases.
//! - Tables from earlier releases carry a mandatory `is_dir` column without a
//!   default; inserts fill it when the bound table has it.

use std::collections::BTreeSet;
use std::sync::Arc;

use arrsync_core::{Ledger, LedgerEntry, ServiceKind, SyncError, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DataError, Result};

const ENTRY_COLUMNS: &str = r"
    id,
    torrent_name,
    COALESCE(retries, 0) AS retries,
    COALESCE(import_complete, 0) AS import_complete,
    COALESCE(notified, 0) AS notified,
    completed_on,
    COALESCE(purged, 0) AS purged
";

struct LedgerSql {
    lookup: String,
    insert: String,
    increment_retry: String,
    select_incomplete: String,
    mark_complete: String,
    select_purgeable: String,
    mark_purged: String,
    set_notified: String,
}

/// Columns of an existing ledger table that change how rows are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TableShape {
    legacy_is_dir: bool,
}

impl TableShape {
    async fn inspect(pool: &SqlitePool, table: &str) -> Result<Self> {
        let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?1)")
            .bind(table)
            .fetch_all(pool)
            .await
            .map_err(DataError::query("ledger.inspect"))?;
        Ok(Self {
            legacy_is_dir: columns.iter().any(|column| column == "is_dir"),
        })
    }
}

impl LedgerSql {
    fn for_table(table: &str, shape: TableShape) -> Self {
        // The remote listing decides directory vs file each run; the stored
        // flag is never read back.
        let (extra_column, extra_value) = if shape.legacy_is_dir {
            (", is_dir", ", 0")
        } else {
            ("", "")
        };
        Self {
            lookup: format!("SELECT {ENTRY_COLUMNS} FROM {table} WHERE torrent_name = ?1"),
            insert: format!(
                "INSERT INTO {table} \
                 (torrent_name, retries, import_complete, notified, purged{extra_column}) \
                 VALUES (?1, 1, 0, 0, 0{extra_value}) ON CONFLICT (torrent_name) DO NOTHING"
            ),
            increment_retry: format!(
                "UPDATE {table} SET retries = COALESCE(retries, 0) + 1 \
                 WHERE torrent_name = ?1 AND COALESCE(import_complete, 0) = 0"
            ),
            select_incomplete: format!(
                "SELECT id, torrent_name FROM {table} \
                 WHERE COALESCE(import_complete, 0) = 0 AND COALESCE(purged, 0) = 0"
            ),
            mark_complete: format!(
                "UPDATE {table} SET import_complete = 1, completed_on = ?1 WHERE id = ?2"
            ),
            select_purgeable: format!(
                "SELECT {ENTRY_COLUMNS} FROM {table} \
                 WHERE COALESCE(import_complete, 0) = 1 AND COALESCE(purged, 0) = 0 \
                 ORDER BY id"
            ),
            mark_purged: format!(
                "UPDATE {table} SET purged = 1 \
                 WHERE torrent_name = ?1 AND import_complete = 1 AND COALESCE(purged, 0) = 0"
            ),
            set_notified: format!("UPDATE {table} SET notified = 1 WHERE torrent_name = ?1"),
        }
    }
}

#[derive(FromRow)]
struct LedgerRow {
    id: i64,
    torrent_name: String,
    retries: i64,
    import_complete: bool,
    notified: bool,
    completed_on: Option<DateTime<Utc>>,
    purged: bool,
}

impl From<LedgerRow> for LedgerEntry {
    fn from(row: LedgerRow) -> Self {
        Self {
            id: row.id,
            torrent_name: row.torrent_name,
            retries: u32::try_from(row.retries.max(0)).unwrap_or(u32::MAX),
            import_complete: row.import_complete,
            notified: row.notified,
            completed_on: row.completed_on,
            purged: row.purged,
        }
    }
}

#[derive(FromRow)]
struct IncompleteRow {
    id: i64,
    torrent_name: String,
}

/// Ledger for one service table.
#[derive(Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
    service: ServiceKind,
    sql: Arc<LedgerSql>,
}

impl LedgerStore {
    /// Apply pending migrations to `pool`.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(pool: &SqlitePool) -> Result<()> {
        let mut migrator = sqlx::migrate!("./migrations");
        migrator.set_ignore_missing(true);
        migrator
            .run(pool)
            .await
            .map_err(|source| DataError::MigrationFailed { source })
    }

    /// Bind a store to `service`'s table without running migrations.
    ///
    /// The table's columns are inspected once so that tables created by
    /// earlier releases are written in their own shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be inspected.
    pub async fn for_service(pool: SqlitePool, service: ServiceKind) -> Result<Self> {
        let table = service.ledger_table();
        let shape = TableShape::inspect(&pool, table).await?;
        if shape.legacy_is_dir {
            debug!(service = %service, table, "adopting ledger table from an earlier release");
        }
        Ok(Self {
            pool,
            service,
            sql: Arc::new(LedgerSql::for_table(table, shape)),
        })
    }

    /// Migrate `pool`, then bind a store to `service`'s table.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail or the table cannot be inspected.
    pub async fn open(pool: SqlitePool, service: ServiceKind) -> Result<Self> {
        Self::migrate(&pool).await?;
        Self::for_service(pool, service).await
    }

    /// Fetch one row by ledger key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find(&self, torrent_name: &str) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerRow>(&self.sql.lookup)
            .bind(torrent_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(DataError::query("ledger.lookup"))?;
        Ok(row.map(LedgerEntry::from))
    }

    /// Insert a row with one attempt unless the key is already tracked.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn track(&self, torrent_name: &str) -> Result<bool> {
        let result = sqlx::query(&self.sql.insert)
            .bind(torrent_name)
            .execute(&self.pool)
            .await
            .map_err(DataError::query("ledger.ensure_tracked"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Add one attempt to an incomplete row.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn bump_retries(&self, torrent_name: &str) -> Result<u64> {
        let result = sqlx::query(&self.sql.increment_retry)
            .bind(torrent_name)
            .execute(&self.pool)
            .await
            .map_err(DataError::query("ledger.increment_retry"))?;
        Ok(result.rows_affected())
    }

    /// Complete every unpurged, incomplete row whose key is not in `present`.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; no row is changed in that case.
    pub async fn complete_missing(
        &self,
        present: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DataError::query("ledger.mark_complete.begin"))?;

        let rows = sqlx::query_as::<_, IncompleteRow>(&self.sql.select_incomplete)
            .fetch_all(&mut *tx)
            .await
            .map_err(DataError::query("ledger.mark_complete.select"))?;

        let mut changed = 0;
        for row in rows
            .iter()
            .filter(|row| !present.contains(&row.torrent_name))
        {
            let result = sqlx::query(&self.sql.mark_complete)
                .bind(now)
                .bind(row.id)
                .execute(&mut *tx)
                .await
                .map_err(DataError::query("ledger.mark_complete.update"))?;
            changed += result.rows_affected();
            debug!(service = %self.service, path = %row.torrent_name, "marked complete");
        }

        tx.commit()
            .await
            .map_err(DataError::query("ledger.mark_complete.commit"))?;
        Ok(changed)
    }

    /// Rows that are complete and still have a local copy to delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn purgeable(&self) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerRow>(&self.sql.select_purgeable)
            .fetch_all(&self.pool)
            .await
            .map_err(DataError::query("ledger.select_purgeable"))?;
        Ok(rows.into_iter().map(LedgerEntry::from).collect())
    }

    /// Flag complete rows as purged, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if any update fails; no row is changed in that case.
    pub async fn purge(&self, torrent_names: &[String]) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DataError::query("ledger.mark_purged.begin"))?;

        let mut changed = 0;
        for name in torrent_names {
            let result = sqlx::query(&self.sql.mark_purged)
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(DataError::query("ledger.mark_purged.update"))?;
            changed += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(DataError::query("ledger.mark_purged.commit"))?;
        Ok(changed)
    }

    /// Flip the notified flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn notify(&self, torrent_name: &str) -> Result<u64> {
        let result = sqlx::query(&self.sql.set_notified)
            .bind(torrent_name)
            .execute(&self.pool)
            .await
            .map_err(DataError::query("ledger.set_notified"))?;
        Ok(result.rows_affected())
    }
}

fn scoped(operation: &'static str, torrent_name: &str) -> impl FnOnce(DataError) -> SyncError {
    move |err| SyncError::ledger(operation, Some(torrent_name), err)
}

#[async_trait]
impl Ledger for LedgerStore {
    fn service(&self) -> ServiceKind {
        self.service
    }

    async fn lookup(&self, torrent_name: &str) -> SyncResult<Option<LedgerEntry>> {
        self.find(torrent_name)
            .await
            .map_err(scoped("ledger.lookup", torrent_name))
    }

    async fn ensure_tracked(&self, torrent_name: &str) -> SyncResult<()> {
        self.track(torrent_name)
            .await
            .map(|_| ())
            .map_err(scoped("ledger.ensure_tracked", torrent_name))
    }

    async fn increment_retry(&self, torrent_name: &str) -> SyncResult<()> {
        self.bump_retries(torrent_name)
            .await
            .map(|_| ())
            .map_err(scoped("ledger.increment_retry", torrent_name))
    }

    async fn mark_complete_missing(&self, present: &BTreeSet<String>) -> SyncResult<u64> {
        self.complete_missing(present, Utc::now())
            .await
            .map_err(|err| SyncError::ledger("ledger.mark_complete_missing", None, err))
    }

    async fn select_purgeable(&self) -> SyncResult<Vec<LedgerEntry>> {
        self.purgeable()
            .await
            .map_err(|err| SyncError::ledger("ledger.select_purgeable", None, err))
    }

    async fn mark_purged(&self, torrent_names: &[String]) -> SyncResult<u64> {
        self.purge(torrent_names)
            .await
            .map_err(|err| SyncError::ledger("ledger.mark_purged", None, err))
    }

    async fn set_notified(&self, torrent_name: &str) -> SyncResult<()> {
        self.notify(torrent_name)
            .await
            .map(|_| ())
            .map_err(scoped("ledger.set_notified", torrent_name))
    }
}
