//! In-memory collaborators for exercising pipelines without I/O.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::collaborators::{
    BulkCopier, Ledger, Notifier, PermissionAdjuster, QueueSource, RemoteLister,
};
use crate::error::{SyncError, SyncResult};
use crate::model::{
    CandidateItem, LedgerEntry, QueueRecord, RemoteListing, ServiceKind, Severity,
    TransferOutcome,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Incomplete, unnotified row with the given attempt count.
#[must_use]
pub fn ledger_entry(torrent_name: &str, retries: u32) -> LedgerEntry {
    LedgerEntry {
        id: 0,
        torrent_name: torrent_name.to_string(),
        retries,
        import_complete: false,
        notified: false,
        completed_on: None,
        purged: false,
    }
}

/// Queue record that passes the normaliser's filters.
#[must_use]
pub fn pending_record(output_path: &str) -> QueueRecord {
    QueueRecord {
        protocol: "torrent".to_string(),
        tracked_download_state: Some("importPending".to_string()),
        output_path: Some(output_path.to_string()),
        title: None,
    }
}

/// Ledger kept in a map, with optional injected lookup failures.
pub struct MemoryLedger {
    service: ServiceKind,
    rows: Mutex<BTreeMap<String, LedgerEntry>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new(service: ServiceKind) -> Self {
        Self::with_rows(service, [])
    }

    /// Ledger seeded with rows; ids are assigned in order.
    #[must_use]
    pub fn with_rows(service: ServiceKind, rows: impl IntoIterator<Item = LedgerEntry>) -> Self {
        let rows = rows
            .into_iter()
            .zip(1_i64..)
            .map(|(entry, id)| (entry.torrent_name.clone(), LedgerEntry { id, ..entry }))
            .collect();
        Self {
            service,
            rows: Mutex::new(rows),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Current row for `torrent_name`.
    #[must_use]
    pub fn entry(&self, torrent_name: &str) -> Option<LedgerEntry> {
        lock(&self.rows).get(torrent_name).cloned()
    }

    /// Make every call touching `torrent_name` fail.
    pub fn fail_lookup(&self, torrent_name: &str) {
        lock(&self.failing).insert(torrent_name.to_string());
    }

    fn check(&self, operation: &'static str, torrent_name: &str) -> SyncResult<()> {
        if lock(&self.failing).contains(torrent_name) {
            return Err(SyncError::ledger(
                operation,
                Some(torrent_name),
                "injected failure",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    fn service(&self) -> ServiceKind {
        self.service
    }

    async fn lookup(&self, torrent_name: &str) -> SyncResult<Option<LedgerEntry>> {
        self.check("ledger.lookup", torrent_name)?;
        Ok(self.entry(torrent_name))
    }

    async fn ensure_tracked(&self, torrent_name: &str) -> SyncResult<()> {
        self.check("ledger.ensure_tracked", torrent_name)?;
        let mut rows = lock(&self.rows);
        let next_id = i64::try_from(rows.len()).unwrap_or(i64::MAX) + 1;
        rows.entry(torrent_name.to_string())
            .or_insert_with(|| LedgerEntry {
                id: next_id,
                ..ledger_entry(torrent_name, 1)
            });
        Ok(())
    }

    async fn increment_retry(&self, torrent_name: &str) -> SyncResult<()> {
        self.check("ledger.increment_retry", torrent_name)?;
        if let Some(row) = lock(&self.rows).get_mut(torrent_name)
            && !row.import_complete
        {
            row.retries += 1;
        }
        Ok(())
    }

    async fn mark_complete_missing(&self, present: &BTreeSet<String>) -> SyncResult<u64> {
        let now = Utc::now();
        let mut changed = 0;
        for row in lock(&self.rows).values_mut() {
            if !row.purged && !row.import_complete && !present.contains(&row.torrent_name) {
                row.import_complete = true;
                row.completed_on = Some(now);
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn select_purgeable(&self) -> SyncResult<Vec<LedgerEntry>> {
        Ok(lock(&self.rows)
            .values()
            .filter(|row| row.import_complete && !row.purged)
            .cloned()
            .collect())
    }

    async fn mark_purged(&self, torrent_names: &[String]) -> SyncResult<u64> {
        let mut rows = lock(&self.rows);
        let mut changed = 0;
        for name in torrent_names {
            if let Some(row) = rows.get_mut(name)
                && row.import_complete
                && !row.purged
            {
                row.purged = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn set_notified(&self, torrent_name: &str) -> SyncResult<()> {
        self.check("ledger.set_notified", torrent_name)?;
        if let Some(row) = lock(&self.rows).get_mut(torrent_name) {
            row.notified = true;
        }
        Ok(())
    }
}

/// Queue source returning fixed records, or failing.
pub struct StaticQueue {
    records: Option<Vec<QueueRecord>>,
}

impl StaticQueue {
    /// Queue that returns `records` on every call.
    #[must_use]
    pub const fn records(records: Vec<QueueRecord>) -> Self {
        Self {
            records: Some(records),
        }
    }

    /// Queue that is always unavailable.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self { records: None }
    }
}

#[async_trait]
impl QueueSource for StaticQueue {
    async fn fetch_queue(&self) -> SyncResult<Vec<QueueRecord>> {
        self.records.clone().ok_or_else(|| {
            SyncError::queue(ServiceKind::Sonarr, "queue.fetch", "queue unavailable")
        })
    }
}

/// Remote lister returning a fixed listing and recording the roots it was asked for.
pub struct StaticLister {
    listing: Option<RemoteListing>,
    roots: Mutex<Vec<String>>,
}

impl StaticLister {
    /// Lister that returns `listing`.
    #[must_use]
    pub const fn new(listing: RemoteListing) -> Self {
        Self {
            listing: Some(listing),
            roots: Mutex::new(Vec::new()),
        }
    }

    /// Lister that always fails.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            listing: None,
            roots: Mutex::new(Vec::new()),
        }
    }

    /// Roots listed so far.
    #[must_use]
    pub fn roots(&self) -> Vec<String> {
        lock(&self.roots).clone()
    }
}

#[async_trait]
impl RemoteLister for StaticLister {
    async fn list(&self, root: &str) -> SyncResult<RemoteListing> {
        lock(&self.roots).push(root.to_string());
        self.listing
            .clone()
            .ok_or_else(|| SyncError::remote("remote.list", root, "host unreachable"))
    }
}

/// Copier that records each invocation and returns a fixed outcome.
pub struct RecordingCopier {
    outcome: TransferOutcome,
    calls: Mutex<Vec<(Vec<String>, PathBuf)>>,
}

impl RecordingCopier {
    /// Copier that reports `outcome`.
    #[must_use]
    pub const fn new(outcome: TransferOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sources and destination of every invocation.
    #[must_use]
    pub fn calls(&self) -> Vec<(Vec<String>, PathBuf)> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl BulkCopier for RecordingCopier {
    async fn copy(&self, sources: &[String], destination: &Path) -> TransferOutcome {
        lock(&self.calls).push((sources.to_vec(), destination.to_path_buf()));
        self.outcome.clone()
    }
}

/// Notifier that records messages, optionally failing delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    fail: bool,
    sent: Mutex<Vec<(String, Severity)>>,
}

impl RecordingNotifier {
    /// Notifier that accepts every message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier that records and then reports a delivery failure.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Messages delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, Severity)> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str, severity: Severity) -> SyncResult<()> {
        lock(&self.sent).push((message.to_string(), severity));
        if self.fail {
            return Err(SyncError::notification("notify.send", "webhook rejected"));
        }
        Ok(())
    }
}

/// Permission adjuster that records which items it was asked to touch.
#[derive(Default)]
pub struct RecordingAdjuster {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingAdjuster {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative paths passed on each call.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        lock(&self.calls).clone()
    }
}

impl PermissionAdjuster for RecordingAdjuster {
    fn adjust(&self, _destination: &Path, items: &[CandidateItem]) -> SyncResult<()> {
        lock(&self.calls).push(
            items
                .iter()
                .map(|item| item.relative_path.clone())
                .collect(),
        );
        Ok(())
    }
}
