//! Remote shell target and child-process helpers shared by the lister and copier.

use std::process::{Output, Stdio};
use std::time::Duration;

use arrsync_config::SeedboxConfig;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Where and how to reach the seedbox over ssh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteShell {
    target: String,
    port: u16,
}

impl RemoteShell {
    /// Build from explicit parts.
    #[must_use]
    pub fn new(user: &str, host: &str, port: u16) -> Self {
        Self {
            target: format!("{user}@{host}"),
            port,
        }
    }

    /// Build from the loaded seedbox configuration.
    #[must_use]
    pub fn from_config(config: &SeedboxConfig) -> Self {
        Self {
            target: config.target(),
            port: config.port,
        }
    }

    /// `user@host`.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Arguments for `ssh` running `remote_command` non-interactively.
    #[must_use]
    pub fn ssh_args(&self, remote_command: &str) -> Vec<String> {
        vec![
            "-p".to_string(),
            self.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            self.target.clone(),
            remote_command.to_string(),
        ]
    }

    /// Value for rsync's `-e` option.
    #[must_use]
    pub fn rsync_transport(&self) -> String {
        format!("ssh -p {}", self.port)
    }

    /// `user@host:path` source specification.
    #[must_use]
    pub fn remote_spec(&self, path: &str) -> String {
        format!("{}:{path}", self.target)
    }
}

/// Quote `value` as one word for a POSIX shell.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Run `program` to completion, capturing its output.
///
/// # Errors
///
/// Returns [`ClientError::Spawn`] when the program cannot start and
/// [`ClientError::Timeout`] when `timeout` elapses first; the child is killed
/// in that case.
pub(crate) async fn run_command(
    program: &str,
    args: &[String],
    timeout: Option<Duration>,
) -> ClientResult<Output> {
    debug!(program, ?args, "running command");
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let spawn_error = |source| ClientError::Spawn {
        program: program.to_string(),
        source,
    };
    match timeout {
        Some(limit) => tokio::time::timeout(limit, command.output())
            .await
            .map_err(|_| ClientError::Timeout {
                program: program.to_string(),
                after: limit,
            })?
            .map_err(spawn_error),
        None => command.output().await.map_err(spawn_error),
    }
}

/// Trimmed, lossily decoded standard error.
pub(crate) fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_survives_embedded_quotes() {
        assert_eq!(shell_quote("/home/a b"), "'/home/a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn ssh_arguments_are_batch_mode() {
        let shell = RemoteShell::new("alice", "seedbox.example", 2222);
        assert_eq!(
            shell.ssh_args("true"),
            vec!["-p", "2222", "-o", "BatchMode=yes", "alice@seedbox.example", "true"]
        );
        assert_eq!(shell.rsync_transport(), "ssh -p 2222");
        assert_eq!(
            shell.remote_spec("/data/Show S01"),
            "alice@seedbox.example:/data/Show S01"
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let result = run_command("arrsync-definitely-not-installed", &[], None).await;
        assert!(matches!(result, Err(ClientError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_program_times_out() {
        let result = run_command(
            "sleep",
            &["5".to_string()],
            Some(Duration::from_millis(100)),
        )
        .await;
        assert!(matches!(result, Err(ClientError::Timeout { .. })));
    }
}
