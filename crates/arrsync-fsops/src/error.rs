//! # Design
//!
//! - Each permission step owns one variant so callers can tell a chmod failure
//!   from a chown failure without parsing messages.
//! - Messages are constant; the path or name involved travels in a field.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for permission adjustment.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced while adjusting transferred items.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// Mode could not be applied.
    #[error("chmod failed")]
    Chmod {
        /// Entry being updated.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Item metadata could not be read.
    #[error("stat failed")]
    Stat {
        /// Item being inspected.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Owner or group could not be applied.
    #[error("chown failed")]
    Chown {
        /// Entry being updated.
        path: PathBuf,
        /// Underlying syscall error.
        source: nix::Error,
    },
    /// The item tree could not be walked.
    #[error("directory traversal failed")]
    Traverse {
        /// Item root the walk started from.
        root: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Owner or group setting was rejected.
    #[error("invalid ownership setting")]
    InvalidInput {
        /// `owner` or `group`.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The user or group database could not be queried.
    #[error("account lookup failed")]
    Lookup {
        /// `owner` or `group`.
        field: &'static str,
        /// Name being resolved.
        name: String,
        /// Underlying syscall error.
        source: nix::Error,
    },
    /// Some items of a batch could not be adjusted; each failure was logged.
    #[error("permission adjustment incomplete")]
    Incomplete {
        /// Items that failed.
        failed: usize,
        /// Items inside the destination that were attempted.
        attempted: usize,
        /// First failure in the batch.
        #[source]
        first: Box<FsOpsError>,
    },
    /// Ownership changes are not available on this platform.
    #[error("permission adjustment unsupported on this platform")]
    Unsupported {
        /// Operation that was requested.
        operation: &'static str,
    },
}

impl FsOpsError {
    pub(crate) fn chmod(path: &Path, source: io::Error) -> Self {
        Self::Chmod {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn traverse(root: &Path, source: walkdir::Error) -> Self {
        Self::Traverse {
            root: root.to_path_buf(),
            source,
        }
    }

    /// Path the failure is attached to, when there is one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Chmod { path, .. } | Self::Chown { path, .. } | Self::Stat { path, .. } => {
                Some(path)
            }
            Self::Traverse { root, .. } => Some(root),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use walkdir::WalkDir;

    #[test]
    fn variants_keep_path_and_source() -> Result<(), Box<dyn Error>> {
        let chmod = FsOpsError::chmod(Path::new("/data/tv/Show"), io::Error::other("denied"));
        assert_eq!(chmod.to_string(), "chmod failed");
        assert_eq!(chmod.path(), Some(Path::new("/data/tv/Show")));
        assert!(chmod.source().is_some());

        let temp = arrsync_test_support::fixtures::temp_dir("arrsync-fsops-")?;
        let missing = temp.path().join("missing");
        let walk_error = WalkDir::new(&missing)
            .into_iter()
            .next()
            .and_then(Result::err)
            .ok_or_else(|| io::Error::other("expected walkdir error"))?;
        let traverse = FsOpsError::traverse(&missing, walk_error);
        assert_eq!(traverse.path(), Some(missing.as_path()));
        assert!(traverse.source().is_some());

        let invalid = FsOpsError::InvalidInput {
            field: "owner",
            reason: "empty",
            value: None,
        };
        assert!(invalid.path().is_none());
        Ok(())
    }
}
