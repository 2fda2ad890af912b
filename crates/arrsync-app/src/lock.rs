//! Advisory lock that keeps two runs from overlapping.
//!
//! The lock is an exclusive `flock` on a small file next to the ledger. The
//! holder writes its pid, start time and run id into the file so an operator
//! can see who owns it.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Contents of the lock file while a run holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Process id of the holder.
    pub pid: u32,
    /// When the lock was taken.
    pub acquired_at: DateTime<Utc>,
    /// Correlation id of the holding run.
    pub run_id: Uuid,
}

/// Held run lock; released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Try to take the lock without blocking.
    ///
    /// Returns `Ok(None)` when another run holds it.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock file cannot be created, locked or written.
    pub fn acquire(path: &Path, run_id: Uuid) -> AppResult<Option<Self>> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|source| AppError::io("lock.create_dir", parent, source))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| AppError::io("lock.open", path, source))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(source) => return Err(AppError::io("lock.acquire", path, source)),
        }

        let record = LockRecord {
            pid: std::process::id(),
            acquired_at: Utc::now(),
            run_id,
        };
        let json =
            serde_json::to_string(&record).map_err(|source| AppError::LockRecord { source })?;
        file.set_len(0)
            .and_then(|()| file.write_all(json.as_bytes()))
            .and_then(|()| file.flush())
            .map_err(|source| AppError::io("lock.write", path, source))?;
        debug!(path = %path.display(), %run_id, "run lock acquired");

        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    /// Read the record left by the current or last holder.
    #[must_use]
    pub fn holder(path: &Path) -> Option<LockRecord> {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
    }

    /// Lock file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            error!(error = %err, path = %self.path.display(), "failed to release run lock");
        }
    }
}
