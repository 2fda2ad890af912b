//! Domain types shared by the reconciliation pipeline.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of transfer attempts before an item is handed to a human.
pub const RETRY_CEILING: u32 = 3;

/// Upstream services whose queues are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Episode queue (`tv-sonarr` root).
    Sonarr,
    /// Movie queue (`radarr` root).
    Radarr,
}

impl ServiceKind {
    /// Every supported service, in run order.
    pub const ALL: [Self; 2] = [Self::Sonarr, Self::Radarr];

    /// Path segment that marks the service's root inside a queue output path.
    #[must_use]
    pub const fn root_token(self) -> &'static str {
        match self {
            Self::Sonarr => "tv-sonarr",
            Self::Radarr => "radarr",
        }
    }

    /// Human-facing label used in notifications.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sonarr => "Sonarr",
            Self::Radarr => "Radarr",
        }
    }

    /// Lowercase identifier used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sonarr => "sonarr",
            Self::Radarr => "radarr",
        }
    }

    /// Ledger table holding this service's rows.
    #[must_use]
    pub const fn ledger_table(self) -> &'static str {
        match self {
            Self::Sonarr => "tbl_sonarr",
            Self::Radarr => "tbl_radarr",
        }
    }
}

impl Display for ServiceKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Per-run configuration bundle for one service pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceContext {
    /// Service identity.
    pub service: ServiceKind,
    /// Directory on the seedbox that holds this service's downloads.
    pub remote_root: String,
    /// Local directory the bulk copier writes into.
    pub destination: PathBuf,
    /// Attempts allowed before giving up.
    pub retry_ceiling: u32,
}

impl ServiceContext {
    /// Build a context with the standard retry ceiling.
    #[must_use]
    pub fn new(
        service: ServiceKind,
        remote_root: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            service,
            remote_root: remote_root.into(),
            destination: destination.into(),
            retry_ceiling: RETRY_CEILING,
        }
    }

    /// Remote source path for a ledger key.
    #[must_use]
    pub fn remote_path(&self, relative_path: &str) -> String {
        let root = self.remote_root.trim_end_matches('/');
        if root.is_empty() {
            format!("/{relative_path}")
        } else {
            format!("{root}/{relative_path}")
        }
    }

    /// Local path for a ledger key, or `None` when the key would escape the destination.
    #[must_use]
    pub fn local_path(&self, relative_path: &str) -> Option<PathBuf> {
        let relative = Path::new(relative_path);
        let contained = !relative_path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        contained.then(|| self.destination.join(relative))
    }
}

/// One pending-import unit discovered in the queue this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    /// Path relative to the service root; the ledger key.
    pub relative_path: String,
    /// Whether the item is a directory on the remote host.
    pub is_directory: bool,
    /// Remote source path, set once the item needs a transfer.
    pub full_path: Option<String>,
    /// Mirrors the ledger's notified flag once a decision has been made.
    pub notified: bool,
}

impl CandidateItem {
    /// Build a candidate with the provisional directory guess.
    #[must_use]
    pub fn new(relative_path: impl Into<String>) -> Self {
        let relative_path = relative_path.into();
        Self {
            is_directory: relative_path.contains('/'),
            relative_path,
            full_path: None,
            notified: false,
        }
    }

    /// First path segment, used to match the remote listing.
    #[must_use]
    pub fn first_segment(&self) -> &str {
        self.relative_path
            .split('/')
            .next()
            .unwrap_or_default()
    }

    /// Final path segment, used in notification text.
    #[must_use]
    pub fn basename(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(self.relative_path.as_str())
    }
}

/// Persisted record of one item ever seen for a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Row identifier.
    pub id: i64,
    /// Ledger key, equal to the candidate's relative path.
    pub torrent_name: String,
    /// Transfer attempts recorded so far.
    pub retries: u32,
    /// Set once the item vanished from the live queue.
    pub import_complete: bool,
    /// Set once a transfer notification covered the item.
    pub notified: bool,
    /// When the item was marked complete.
    pub completed_on: Option<DateTime<Utc>>,
    /// Set once the local copy was deleted.
    pub purged: bool,
}

/// Decoded queue record shared by both services' APIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    /// Download protocol (`torrent`, `usenet`).
    #[serde(default)]
    pub protocol: String,
    /// Import tracking state reported by the service.
    #[serde(default)]
    pub tracked_download_state: Option<String>,
    /// Path the download client wrote the item to.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Release title, used only for diagnostics.
    #[serde(default)]
    pub title: Option<String>,
}

/// One page of the paginated queue endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePage {
    /// One-based page number.
    #[serde(default)]
    pub page: u32,
    /// Records per page requested.
    #[serde(default)]
    pub page_size: u32,
    /// Total records across all pages.
    #[serde(default)]
    pub total_records: u32,
    /// Records on this page.
    #[serde(default)]
    pub records: Vec<QueueRecord>,
}

/// Entry names one level below a remote root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteListing {
    /// Directory names.
    pub directories: BTreeSet<String>,
    /// Regular file names.
    pub files: BTreeSet<String>,
}

impl RemoteListing {
    /// Build a listing from name iterators.
    pub fn new<D, F>(directories: D, files: F) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }
}

/// Per-candidate outcome of the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// First sighting: start tracking and transfer.
    Track,
    /// Seen before and still under the ceiling: count and transfer again.
    Retry,
    /// Ceiling reached without import: report for manual intervention.
    GiveUp,
    /// Nothing to do this run.
    Skip,
}

/// Result of one bulk copy invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Whether the copy reported success.
    pub success: bool,
    /// Diagnostic text from the copier.
    pub diagnostic: String,
}

impl TransferOutcome {
    /// Successful copy.
    #[must_use]
    pub fn succeeded(diagnostic: impl Into<String>) -> Self {
        Self {
            success: true,
            diagnostic: diagnostic.into(),
        }
    }

    /// Failed copy.
    #[must_use]
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Notification severity tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Routine transfer report.
    Message,
    /// At least one transfer failed.
    Error,
}

impl Severity {
    /// Wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Error => "error",
        }
    }
}

/// Candidate set for one run, or the fact that it could not be gathered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSnapshot {
    /// Queue and remote listing were both read.
    Available(Vec<CandidateItem>),
    /// Either source failed; the run must not mutate the ledger.
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_kind_exposes_tokens_and_tables() {
        assert_eq!(ServiceKind::Sonarr.root_token(), "tv-sonarr");
        assert_eq!(ServiceKind::Radarr.root_token(), "radarr");
        assert_eq!(ServiceKind::Sonarr.ledger_table(), "tbl_sonarr");
        assert_eq!(ServiceKind::Radarr.ledger_table(), "tbl_radarr");
        assert_eq!(ServiceKind::Radarr.label(), "Radarr");
        assert_eq!(ServiceKind::Sonarr.to_string(), "sonarr");
    }

    #[test]
    fn candidate_guesses_directory_from_separator() {
        let nested = CandidateItem::new("Show.S01/ep1.mkv");
        assert!(nested.is_directory);
        assert_eq!(nested.first_segment(), "Show.S01");
        assert_eq!(nested.basename(), "ep1.mkv");

        let flat = CandidateItem::new("Movie.2020.mkv");
        assert!(!flat.is_directory);
        assert_eq!(flat.first_segment(), "Movie.2020.mkv");
        assert_eq!(flat.basename(), "Movie.2020.mkv");
        assert!(!flat.notified);
        assert!(flat.full_path.is_none());
    }

    #[test]
    fn context_joins_remote_and_local_paths() {
        let context = ServiceContext::new(ServiceKind::Sonarr, "/home/seed/tv-sonarr/", "/data/tv");
        assert_eq!(context.retry_ceiling, RETRY_CEILING);
        assert_eq!(context.remote_path("Show"), "/home/seed/tv-sonarr/Show");
        assert_eq!(
            context.local_path("Show"),
            Some(PathBuf::from("/data/tv/Show"))
        );
    }

    #[test]
    fn local_path_rejects_escaping_keys() {
        let context = ServiceContext::new(ServiceKind::Radarr, "/seed/radarr", "/data/movies");
        assert!(context.local_path("").is_none());
        assert!(context.local_path("../etc").is_none());
        assert!(context.local_path("/etc/passwd").is_none());
        assert!(context.local_path("Movie/../../etc").is_none());
    }

    #[test]
    fn queue_page_decodes_camel_case_payload() -> anyhow::Result<()> {
        let page: QueuePage = serde_json::from_value(serde_json::json!({
            "page": 1,
            "pageSize": 1000,
            "totalRecords": 1,
            "records": [{
                "protocol": "torrent",
                "trackedDownloadState": "importPending",
                "outputPath": "/downloads/tv-sonarr/Show.S01",
                "title": "Show.S01",
                "sizeleft": 0
            }]
        }))?;
        assert_eq!(page.total_records, 1);
        assert_eq!(
            page.records[0].output_path.as_deref(),
            Some("/downloads/tv-sonarr/Show.S01")
        );
        Ok(())
    }
}
