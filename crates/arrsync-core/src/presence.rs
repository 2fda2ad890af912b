//! Remote presence filtering: keep only candidates that exist on the seedbox.

use std::collections::HashSet;

use tracing::debug;

use crate::model::{CandidateItem, RemoteListing};

/// Refine candidates against the remote listing.
///
/// A first segment naming a remote directory makes the candidate that
/// directory; a first segment naming a remote file keeps the candidate as a
/// file; anything else is dropped. Candidates that collapse onto the same
/// directory are kept once.
#[must_use]
pub fn filter_present(
    candidates: Vec<CandidateItem>,
    listing: &RemoteListing,
) -> Vec<CandidateItem> {
    let mut seen = HashSet::new();
    let mut present = Vec::with_capacity(candidates.len());

    for mut candidate in candidates {
        let segment = candidate.first_segment().to_string();
        if listing.directories.contains(&segment) {
            candidate.is_directory = true;
            candidate.relative_path = segment;
        } else if listing.files.contains(&segment) {
            candidate.is_directory = false;
        } else {
            debug!(path = %candidate.relative_path, "candidate not present on remote host");
            continue;
        }

        if seen.insert(candidate.relative_path.clone()) {
            present.push(candidate);
        }
    }

    present
}
