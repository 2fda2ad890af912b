//! One-level remote directory listing over ssh.

use std::collections::BTreeSet;
use std::time::Duration;

use arrsync_core::{RemoteLister, RemoteListing, SyncError, SyncResult};
use async_trait::async_trait;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::shell::{RemoteShell, run_command, shell_quote, stderr_text};

const DEFAULT_PROGRAM: &str = "ssh";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Entry type selector for `find -type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Directories.
    Directory,
    /// Regular files.
    File,
}

impl EntryKind {
    const fn find_type(self) -> char {
        match self {
            Self::Directory => 'd',
            Self::File => 'f',
        }
    }
}

/// Remote `find` command listing names directly below `root`.
#[must_use]
pub fn find_command(root: &str, kind: EntryKind) -> String {
    format!(
        "find {} -mindepth 1 -maxdepth 1 -type {} -printf '%f\\n'",
        shell_quote(root),
        kind.find_type()
    )
}

/// Names printed one per line.
#[must_use]
pub fn parse_listing(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lists a seedbox directory through `ssh ... find`.
#[derive(Debug, Clone)]
pub struct SshLister {
    shell: RemoteShell,
    program: String,
    timeout: Duration,
}

impl SshLister {
    /// Lister using the system `ssh` binary.
    #[must_use]
    pub fn new(shell: RemoteShell) -> Self {
        Self {
            shell,
            program: DEFAULT_PROGRAM.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a different ssh executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Override the per-command timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Names of one entry kind directly below `root`.
    ///
    /// # Errors
    ///
    /// Returns an error when ssh cannot run, times out or exits non-zero.
    pub async fn list_kind(&self, root: &str, kind: EntryKind) -> ClientResult<BTreeSet<String>> {
        let args = self.shell.ssh_args(&find_command(root, kind));
        let output = run_command(&self.program, &args, Some(self.timeout)).await?;
        if !output.status.success() {
            return Err(ClientError::CommandFailed {
                program: self.program.clone(),
                status: output.status.code(),
                stderr: stderr_text(&output),
            });
        }
        let names = parse_listing(&String::from_utf8_lossy(&output.stdout));
        debug!(
            remote = %self.shell.target(),
            root,
            kind = ?kind,
            entries = names.len(),
            "remote listing read"
        );
        Ok(names)
    }
}

#[async_trait]
impl RemoteLister for SshLister {
    async fn list(&self, root: &str) -> SyncResult<RemoteListing> {
        let directories = self
            .list_kind(root, EntryKind::Directory)
            .await
            .map_err(|err| SyncError::remote("ssh.list_directories", root, err))?;
        let files = self
            .list_kind(root, EntryKind::File)
            .await
            .map_err(|err| SyncError::remote("ssh.list_files", root, err))?;
        Ok(RemoteListing { directories, files })
    }
}
