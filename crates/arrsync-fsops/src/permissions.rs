//! Mode and ownership adjustment for transferred items.
//!
//! # Design
//! - Owner and group names are resolved once, when the adjuster is built.
//! - Symbolic links are never followed and never modified.
//! - Items that do not exist locally are skipped.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use arrsync_config::PermissionPolicy;
use arrsync_core::{CandidateItem, PermissionAdjuster, SyncError, SyncResult};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[cfg(unix)]
use nix::unistd::{Gid, Group, Uid, User, chown};

use crate::error::{FsOpsError, FsOpsResult};

/// Counts from one recursive adjustment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdjustSummary {
    /// Files and directories updated.
    pub entries: u64,
    /// Symbolic links left untouched.
    pub skipped_links: u64,
}

/// Applies a resolved [`PermissionPolicy`] below a destination directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FsPermissionAdjuster {
    mode: Option<u32>,
    uid: Option<u32>,
    gid: Option<u32>,
}

impl FsPermissionAdjuster {
    /// Resolve owner and group names and build the adjuster.
    ///
    /// # Errors
    ///
    /// Returns an error when an owner or group name cannot be resolved.
    #[cfg(unix)]
    pub fn from_policy(policy: &PermissionPolicy) -> FsOpsResult<Self> {
        Ok(Self {
            mode: policy.mode,
            uid: policy.owner.as_deref().map(resolve_owner).transpose()?,
            gid: policy.group.as_deref().map(resolve_group).transpose()?,
        })
    }

    /// Build the adjuster; only an empty policy is supported off Unix.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Unsupported`] for any non-empty policy.
    #[cfg(not(unix))]
    pub fn from_policy(policy: &PermissionPolicy) -> FsOpsResult<Self> {
        if policy.is_noop() {
            return Ok(Self::default());
        }
        Err(FsOpsError::Unsupported {
            operation: "permissions.from_policy",
        })
    }

    /// Whether the adjuster changes nothing.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.mode.is_none() && self.uid.is_none() && self.gid.is_none()
    }

    /// Apply the policy to `root` and everything below it.
    ///
    /// # Errors
    ///
    /// Returns the first traversal, chmod or chown failure.
    pub fn apply(&self, root: &Path) -> FsOpsResult<AdjustSummary> {
        let mut summary = AdjustSummary::default();
        if self.is_noop() {
            return Ok(summary);
        }

        for entry in WalkDir::new(root).follow_links(false).follow_root_links(false) {
            let entry = entry.map_err(|source| FsOpsError::traverse(root, source))?;
            if entry.file_type().is_symlink() {
                summary.skipped_links += 1;
                continue;
            }
            self.apply_entry(entry.path())?;
            summary.entries += 1;
        }
        Ok(summary)
    }

    #[cfg(unix)]
    fn apply_entry(&self, path: &Path) -> FsOpsResult<()> {
        if let Some(mode) = self.mode {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))
                .map_err(|source| FsOpsError::chmod(path, source))?;
        }
        if self.uid.is_some() || self.gid.is_some() {
            chown(path, self.uid.map(Uid::from_raw), self.gid.map(Gid::from_raw)).map_err(
                |source| FsOpsError::Chown {
                    path: path.to_path_buf(),
                    source,
                },
            )?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    #[allow(clippy::unused_self)]
    const fn apply_entry(&self, _path: &Path) -> FsOpsResult<()> {
        Ok(())
    }

    /// `Ok(None)` when nothing exists at `path`.
    fn adjust_item(&self, path: &Path) -> FsOpsResult<Option<AdjustSummary>> {
        match fs::symlink_metadata(path) {
            Ok(_) => self.apply(path).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(FsOpsError::Stat {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl PermissionAdjuster for FsPermissionAdjuster {
    fn adjust(&self, destination: &Path, items: &[CandidateItem]) -> SyncResult<()> {
        if self.is_noop() {
            return Ok(());
        }

        let mut attempted = 0;
        let mut failures: Vec<(PathBuf, FsOpsError)> = Vec::new();
        for item in items {
            let Some(path) = contained_path(destination, &item.relative_path) else {
                warn!(
                    path = %item.relative_path,
                    "refusing to adjust a path outside the destination"
                );
                continue;
            };
            attempted += 1;
            match self.adjust_item(&path) {
                Ok(Some(summary)) => debug!(
                    path = %path.display(),
                    entries = summary.entries,
                    skipped_links = summary.skipped_links,
                    "permissions adjusted"
                ),
                Ok(None) => debug!(
                    path = %path.display(),
                    "item not present locally; permissions skipped"
                ),
                Err(err) => {
                    let failed = err.path().map_or_else(|| path.clone(), Path::to_path_buf);
                    warn!(
                        path = %failed.display(),
                        error = %err,
                        detail = ?err,
                        "failed to adjust permissions; continuing with the next item"
                    );
                    failures.push((failed, err));
                }
            }
        }

        let failed = failures.len();
        let Some((path, first)) = failures.into_iter().next() else {
            return Ok(());
        };
        Err(SyncError::permissions(
            "permissions.apply",
            path,
            FsOpsError::Incomplete {
                failed,
                attempted,
                first: Box::new(first),
            },
        ))
    }
}

fn contained_path(destination: &Path, relative: &str) -> Option<PathBuf> {
    let relative_path = Path::new(relative);
    let contained = !relative.is_empty()
        && relative_path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    contained.then(|| destination.join(relative_path))
}

#[cfg(unix)]
fn resolve_owner(spec: &str) -> FsOpsResult<u32> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(FsOpsError::InvalidInput {
            field: "owner",
            reason: "empty",
            value: Some(spec.to_string()),
        });
    }
    if let Ok(id) = trimmed.parse::<u32>() {
        return Ok(id);
    }
    let user = User::from_name(trimmed)
        .map_err(|source| FsOpsError::Lookup {
            field: "owner",
            name: trimmed.to_string(),
            source,
        })?
        .ok_or_else(|| FsOpsError::InvalidInput {
            field: "owner",
            reason: "not_found",
            value: Some(trimmed.to_string()),
        })?;
    Ok(user.uid.as_raw())
}

#[cfg(unix)]
fn resolve_group(spec: &str) -> FsOpsResult<u32> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(FsOpsError::InvalidInput {
            field: "group",
            reason: "empty",
            value: Some(spec.to_string()),
        });
    }
    if let Ok(id) = trimmed.parse::<u32>() {
        return Ok(id);
    }
    let group = Group::from_name(trimmed)
        .map_err(|source| FsOpsError::Lookup {
            field: "group",
            name: trimmed.to_string(),
            source,
        })?
        .ok_or_else(|| FsOpsError::InvalidInput {
            field: "group",
            reason: "not_found",
            value: Some(trimmed.to_string()),
        })?;
    Ok(group.gid.as_raw())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use arrsync_test_support::fixtures;
    use std::os::unix::fs::{MetadataExt, symlink};

    type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

    fn mode_of(path: &Path) -> io::Result<u32> {
        Ok(fs::symlink_metadata(path)?.mode() & 0o7777)
    }

    fn chmod(mode: u32) -> PermissionPolicy {
        PermissionPolicy {
            mode: Some(mode),
            ..PermissionPolicy::default()
        }
    }

    #[test]
    fn numeric_owner_and_group_are_used_verbatim() -> TestResult<()> {
        assert_eq!(resolve_owner(" 1000 ")?, 1000);
        assert_eq!(resolve_group("100")?, 100);
        assert_eq!(resolve_owner("root")?, 0);
        Ok(())
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            resolve_owner("arrsync-no-such-user"),
            Err(FsOpsError::InvalidInput {
                field: "owner",
                reason: "not_found",
                ..
            })
        ));
        assert!(matches!(
            resolve_group("arrsync-no-such-group"),
            Err(FsOpsError::InvalidInput {
                field: "group",
                reason: "not_found",
                ..
            })
        ));
        assert!(matches!(
            resolve_owner("  "),
            Err(FsOpsError::InvalidInput { reason: "empty", .. })
        ));
    }

    #[test]
    fn apply_sets_mode_recursively() -> TestResult<()> {
        let temp = fixtures::temp_dir("arrsync-fsops-")?;
        fixtures::write_file(temp.path(), "Show.S01/Season 1/ep1.mkv", b"video")?;
        fixtures::write_file(temp.path(), "Show.S01/info.nfo", b"nfo")?;
        let root = temp.path().join("Show.S01");

        let adjuster = FsPermissionAdjuster::from_policy(&chmod(0o750))?;
        let summary = adjuster.apply(&root)?;

        assert_eq!(summary.entries, 4);
        assert_eq!(summary.skipped_links, 0);
        assert_eq!(mode_of(&root)?, 0o750);
        assert_eq!(mode_of(&root.join("Season 1"))?, 0o750);
        assert_eq!(mode_of(&root.join("Season 1/ep1.mkv"))?, 0o750);
        assert_eq!(mode_of(&root.join("info.nfo"))?, 0o750);
        Ok(())
    }

    #[test]
    fn apply_leaves_symlink_targets_alone() -> TestResult<()> {
        let temp = fixtures::temp_dir("arrsync-fsops-")?;
        fixtures::write_file(temp.path(), "outside.txt", b"keep")?;
        fixtures::write_file(temp.path(), "Movie/movie.mkv", b"video")?;
        let outside = temp.path().join("outside.txt");
        fs::set_permissions(&outside, fs::Permissions::from_mode(0o600))?;
        symlink(&outside, temp.path().join("Movie/link.txt"))?;
        symlink(&outside, temp.path().join("Linked"))?;

        let adjuster = FsPermissionAdjuster::from_policy(&chmod(0o755))?;
        let summary = adjuster.apply(&temp.path().join("Movie"))?;
        assert_eq!(summary.skipped_links, 1);

        let root_link = adjuster.apply(&temp.path().join("Linked"))?;
        assert_eq!(root_link.entries, 0);
        assert_eq!(root_link.skipped_links, 1);
        assert_eq!(mode_of(&outside)?, 0o600);
        Ok(())
    }

    #[test]
    fn chown_to_current_ids_succeeds() -> TestResult<()> {
        let temp = fixtures::temp_dir("arrsync-fsops-")?;
        fixtures::write_file(temp.path(), "Movie.mkv", b"video")?;
        let policy = PermissionPolicy {
            mode: None,
            owner: Some(nix::unistd::getuid().as_raw().to_string()),
            group: Some(nix::unistd::getgid().as_raw().to_string()),
        };

        let adjuster = FsPermissionAdjuster::from_policy(&policy)?;
        let summary = adjuster.apply(&temp.path().join("Movie.mkv"))?;
        assert_eq!(summary.entries, 1);
        assert_eq!(
            fs::metadata(temp.path().join("Movie.mkv"))?.uid(),
            nix::unistd::getuid().as_raw()
        );
        Ok(())
    }

    #[test]
    fn noop_policy_touches_nothing() -> TestResult<()> {
        let temp = fixtures::temp_dir("arrsync-fsops-")?;
        fixtures::write_file(temp.path(), "file", b"x")?;
        let path = temp.path().join("file");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640))?;

        let adjuster = FsPermissionAdjuster::from_policy(&PermissionPolicy::default())?;
        assert!(adjuster.is_noop());
        assert_eq!(adjuster.apply(&path)?, AdjustSummary::default());
        assert_eq!(mode_of(&path)?, 0o640);
        Ok(())
    }

    #[test]
    fn contained_path_rejects_escapes() {
        let dest = Path::new("/media/tv");
        assert_eq!(
            contained_path(dest, "Show/ep.mkv"),
            Some(PathBuf::from("/media/tv/Show/ep.mkv"))
        );
        assert!(contained_path(dest, "../etc").is_none());
        assert!(contained_path(dest, "/etc/passwd").is_none());
        assert!(contained_path(dest, "").is_none());
    }
}
