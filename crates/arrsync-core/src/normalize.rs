//! Queue snapshot normalisation: raw queue records to candidate items.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::model::{CandidateItem, QueueRecord, ServiceKind};

/// Only torrent downloads are mirrored from the seedbox.
pub const TORRENT_PROTOCOL: &str = "torrent";

/// Tracked-download states that mean "downloaded, waiting for an import".
pub const IMPORT_STATES: [&str; 2] = ["importPending", "importBlocked"];

/// Reduce queue records to unique candidates, preserving first-seen order.
#[must_use]
pub fn normalize_queue(service: ServiceKind, records: &[QueueRecord]) -> Vec<CandidateItem> {
    let token = service.root_token();
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for record in records.iter().filter(|record| is_pending_import(record)) {
        let Some(output_path) = record.output_path.as_deref() else {
            continue;
        };
        let Some(relative) = relative_path(output_path, token) else {
            warn!(
                service = %service,
                output_path,
                title = record.title.as_deref().unwrap_or_default(),
                "queue output path does not contain the service root; skipping"
            );
            continue;
        };
        if seen.insert(relative.clone()) {
            candidates.push(CandidateItem::new(relative));
        }
    }

    debug!(service = %service, candidates = candidates.len(), "normalized queue snapshot");
    candidates
}

/// Normalise a fetch result, turning failures into an empty, logged result.
///
/// Returns `None` when the queue could not be read.
pub fn normalize_fetch(
    service: ServiceKind,
    fetched: SyncResult<Vec<QueueRecord>>,
) -> Option<Vec<CandidateItem>> {
    match fetched {
        Ok(records) => Some(normalize_queue(service, &records)),
        Err(err) => {
            warn!(service = %service, error = %err, detail = ?err, "queue fetch failed");
            None
        }
    }
}

fn is_pending_import(record: &QueueRecord) -> bool {
    record.protocol == TORRENT_PROTOCOL
        && record
            .tracked_download_state
            .as_deref()
            .is_some_and(|state| IMPORT_STATES.contains(&state))
        && record.output_path.is_some()
}

/// Portion of `output_path` after the first segment equal to `root_token`.
#[must_use]
pub fn relative_path(output_path: &str, root_token: &str) -> Option<String> {
    let mut segments = output_path.split('/').filter(|segment| !segment.is_empty());
    segments.by_ref().find(|segment| *segment == root_token)?;
    let remainder: Vec<&str> = segments.collect();
    (!remainder.is_empty()).then(|| remainder.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    fn record(protocol: &str, state: Option<&str>, output: Option<&str>) -> QueueRecord {
        QueueRecord {
            protocol: protocol.to_string(),
            tracked_download_state: state.map(str::to_string),
            output_path: output.map(str::to_string),
            title: None,
        }
    }

    #[test]
    fn relative_path_tolerates_nesting() {
        assert_eq!(
            relative_path("/downloads/tv-sonarr/Show.S01", "tv-sonarr").as_deref(),
            Some("Show.S01")
        );
        assert_eq!(
            relative_path("/mnt/a/b/tv-sonarr/Show.S01/ep1.mkv", "tv-sonarr").as_deref(),
            Some("Show.S01/ep1.mkv")
        );
        assert_eq!(
            relative_path("/data/radarr/Movie.2020/", "radarr").as_deref(),
            Some("Movie.2020")
        );
        assert!(relative_path("/data/radarr", "radarr").is_none());
        assert!(relative_path("/data/movies/Movie", "radarr").is_none());
        assert!(relative_path("/data/radarr-extra/Movie", "radarr").is_none());
    }

    #[test]
    fn normalize_filters_protocol_state_and_missing_paths() {
        let records = vec![
            record("torrent", Some("importPending"), Some("/d/tv-sonarr/A")),
            record("torrent", Some("importBlocked"), Some("/d/tv-sonarr/B/b.mkv")),
            record("usenet", Some("importPending"), Some("/d/tv-sonarr/C")),
            record("torrent", Some("downloading"), Some("/d/tv-sonarr/D")),
            record("torrent", None, Some("/d/tv-sonarr/E")),
            record("torrent", Some("importPending"), None),
            record("torrent", Some("importPending"), Some("/d/elsewhere/F")),
        ];

        let candidates = normalize_queue(ServiceKind::Sonarr, &records);
        let paths: Vec<&str> = candidates
            .iter()
            .map(|item| item.relative_path.as_str())
            .collect();
        assert_eq!(paths, vec!["A", "B/b.mkv"]);
        assert!(!candidates[0].is_directory);
        assert!(candidates[1].is_directory);
    }

    #[test]
    fn normalize_deduplicates_with_first_occurrence_winning() {
        let records = vec![
            record("torrent", Some("importPending"), Some("/d/radarr/Movie")),
            record("torrent", Some("importPending"), Some("/d/radarr/Other")),
            record("torrent", Some("importBlocked"), Some("/x/radarr/Movie")),
        ];
        let candidates = normalize_queue(ServiceKind::Radarr, &records);
        let paths: Vec<&str> = candidates
            .iter()
            .map(|item| item.relative_path.as_str())
            .collect();
        assert_eq!(paths, vec!["Movie", "Other"]);
    }

    #[test]
    fn normalize_fetch_swallows_failures() {
        let failed = normalize_fetch(
            ServiceKind::Sonarr,
            Err(SyncError::queue(ServiceKind::Sonarr, "queue.fetch", "bad json")),
        );
        assert!(failed.is_none());

        let ok = normalize_fetch(
            ServiceKind::Sonarr,
            Ok(vec![record(
                "torrent",
                Some("importPending"),
                Some("/d/tv-sonarr/A"),
            )]),
        );
        assert_eq!(ok.map(|items| items.len()), Some(1));
    }
}
