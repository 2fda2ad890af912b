//! Bulk copy of remote items with a single rsync invocation.

use std::path::Path;
use std::time::Duration;

use arrsync_core::{BulkCopier, TransferOutcome};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::shell::{RemoteShell, run_command, stderr_text};

const DEFAULT_PROGRAM: &str = "rsync";
const BASE_OPTIONS: [&str; 4] = ["--archive", "--compress", "--verbose", "--protect-args"];

/// Copies remote paths into a local directory through `rsync -e ssh`.
#[derive(Debug, Clone)]
pub struct RsyncCopier {
    shell: RemoteShell,
    program: String,
    timeout: Option<Duration>,
}

impl RsyncCopier {
    /// Copier using the system `rsync` binary with no time limit.
    #[must_use]
    pub fn new(shell: RemoteShell) -> Self {
        Self {
            shell,
            program: DEFAULT_PROGRAM.to_string(),
            timeout: None,
        }
    }

    /// Use a different rsync executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Abort transfers that run longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Full argument list for one invocation.
    #[must_use]
    pub fn command_args(&self, sources: &[String], destination: &Path) -> Vec<String> {
        let mut args: Vec<String> = BASE_OPTIONS.iter().map(|opt| (*opt).to_string()).collect();
        args.push("-e".to_string());
        args.push(self.shell.rsync_transport());
        args.extend(sources.iter().map(|source| self.shell.remote_spec(source)));

        let mut destination = destination.display().to_string();
        if !destination.ends_with('/') {
            destination.push('/');
        }
        args.push(destination);
        args
    }
}

#[async_trait]
impl BulkCopier for RsyncCopier {
    async fn copy(&self, sources: &[String], destination: &Path) -> TransferOutcome {
        let args = self.command_args(sources, destination);
        match run_command(&self.program, &args, self.timeout).await {
            Ok(output) if output.status.success() => {
                debug!(
                    remote = %self.shell.target(),
                    sources = sources.len(),
                    stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                    "rsync finished"
                );
                TransferOutcome::succeeded("")
            }
            Ok(output) => {
                let stderr = stderr_text(&output);
                let diagnostic = if stderr.is_empty() {
                    format!("{} exited with status {:?}", self.program, output.status.code())
                } else {
                    stderr
                };
                TransferOutcome::failed(diagnostic)
            }
            Err(err) => {
                warn!(
                    remote = %self.shell.target(),
                    error = %err,
                    detail = ?err,
                    "rsync could not complete"
                );
                TransferOutcome::failed(err.describe())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_invocation_carries_every_source() {
        let copier = RsyncCopier::new(RemoteShell::new("alice", "seedbox.example", 2222));
        let args = copier.command_args(
            &[
                "/home/alice/tv-sonarr/Show.S01".to_string(),
                "/home/alice/tv-sonarr/Other Show.S02".to_string(),
            ],
            Path::new("/media/tv"),
        );
        assert_eq!(
            args,
            vec![
                "--archive",
                "--compress",
                "--verbose",
                "--protect-args",
                "-e",
                "ssh -p 2222",
                "alice@seedbox.example:/home/alice/tv-sonarr/Show.S01",
                "alice@seedbox.example:/home/alice/tv-sonarr/Other Show.S02",
                "/media/tv/",
            ]
        );
    }

    #[test]
    fn destination_slash_is_not_doubled() {
        let copier = RsyncCopier::new(RemoteShell::new("a", "h", 22));
        let args = copier.command_args(&["/x".to_string()], Path::new("/media/movies/"));
        assert_eq!(args.last().map(String::as_str), Some("/media/movies/"));
    }

    #[tokio::test]
    async fn spawn_failure_becomes_failed_outcome() {
        let copier = RsyncCopier::new(RemoteShell::new("a", "h", 22))
            .with_program("arrsync-definitely-not-installed");
        let outcome = copier
            .copy(&["/x".to_string()], Path::new("/tmp"))
            .await;
        assert!(!outcome.success);
        assert!(outcome.diagnostic.starts_with("failed to spawn command"));
    }
}
