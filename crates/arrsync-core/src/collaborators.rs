//! Collaborator traits implemented by the HTTP, remote-shell, filesystem and storage adapters.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::model::{
    CandidateItem, LedgerEntry, QueueRecord, RemoteListing, ServiceKind, Severity,
    TransferOutcome,
};

/// Download-queue API for one service.
#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Fetch every queue record currently known to the service.
    async fn fetch_queue(&self) -> SyncResult<Vec<QueueRecord>>;
}

/// One-level listing of a directory on the remote host.
#[async_trait]
pub trait RemoteLister: Send + Sync {
    /// List directory and file names directly below `root`.
    async fn list(&self, root: &str) -> SyncResult<RemoteListing>;
}

/// Batched copy from the remote host into a local directory.
#[async_trait]
pub trait BulkCopier: Send + Sync {
    /// Copy every source path into `destination` in a single invocation.
    async fn copy(&self, sources: &[String], destination: &Path) -> TransferOutcome;
}

/// Outbound message delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message tagged with `severity`.
    async fn notify(&self, message: &str, severity: Severity) -> SyncResult<()>;
}

/// Ownership and mode fix-ups for transferred items.
pub trait PermissionAdjuster: Send + Sync {
    /// Apply the configured policy to each item below `destination`.
    ///
    /// # Errors
    ///
    /// Returns the first failure; items after it are left untouched.
    fn adjust(&self, destination: &Path, items: &[CandidateItem]) -> SyncResult<()>;
}

/// Persisted per-service ledger. Each call commits as one transaction.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Service whose table this ledger is bound to.
    fn service(&self) -> ServiceKind;

    /// Fetch the row for `torrent_name`, if tracked.
    async fn lookup(&self, torrent_name: &str) -> SyncResult<Option<LedgerEntry>>;

    /// Insert a row with one recorded attempt; no-op when already tracked.
    async fn ensure_tracked(&self, torrent_name: &str) -> SyncResult<()>;

    /// Record another attempt for an incomplete row.
    async fn increment_retry(&self, torrent_name: &str) -> SyncResult<()>;

    /// Mark every unpurged, incomplete row absent from `present` as complete.
    /// Returns the number of rows changed.
    async fn mark_complete_missing(&self, present: &BTreeSet<String>) -> SyncResult<u64>;

    /// Rows that are complete but not yet purged.
    async fn select_purgeable(&self) -> SyncResult<Vec<LedgerEntry>>;

    /// Flag complete rows as purged. Returns the number of rows changed.
    async fn mark_purged(&self, torrent_names: &[String]) -> SyncResult<u64>;

    /// Flip the notified flag for one row.
    async fn set_notified(&self, torrent_name: &str) -> SyncResult<()>;
}
