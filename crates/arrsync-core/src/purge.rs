//! Local deletion of imported items.

use std::fs;
use std::io;
use std::path::Path;

/// What happened when a purge was attempted.
#[derive(Debug)]
pub enum PurgeOutcome {
    /// The directory tree or file was removed.
    Removed,
    /// The path is a symbolic link and was left alone.
    Symlink,
    /// Nothing exists at the path.
    Missing,
    /// Removal failed.
    Failed(io::Error),
}

/// Remove `path` (recursively for directories) unless it is a symbolic link.
///
/// The link check uses `symlink_metadata`, so links are never followed.
#[must_use]
pub fn purge_local(path: &Path) -> PurgeOutcome {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return PurgeOutcome::Missing,
        Err(err) => return PurgeOutcome::Failed(err),
    };

    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        return PurgeOutcome::Symlink;
    }
    let removed = if file_type.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match removed {
        Ok(()) => PurgeOutcome::Removed,
        Err(err) => PurgeOutcome::Failed(err),
    }
}
