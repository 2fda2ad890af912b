//! Command-line flags.

use std::path::PathBuf;

use arrsync_telemetry::LogFormat;
use clap::{Parser, ValueEnum};

/// Dotenv file read when `--env-file` is not given; silently skipped if absent.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Reconcile Sonarr/Radarr import queues with a seedbox and a local ledger.
#[derive(Debug, Parser)]
#[command(name = "arrsync", version, about)]
pub struct Cli {
    /// Load variables from this dotenv file before reading the environment.
    #[arg(long, value_name = "PATH", env = "ARRSYNC_ENV_FILE")]
    pub env_file: Option<PathBuf>,
    /// Log output format; overrides `LOG_FORMAT`.
    #[arg(long, value_enum)]
    pub log_format: Option<CliLogFormat>,
}

/// Log format accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliLogFormat {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

impl From<CliLogFormat> for LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Json => Self::Json,
            CliLogFormat::Pretty => Self::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_arguments_are_required() {
        let cli = Cli::try_parse_from(["arrsync"]).unwrap();
        assert!(cli.log_format.is_none());
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::try_parse_from([
            "arrsync",
            "--env-file",
            "/etc/arrsync.env",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.env_file, Some(PathBuf::from("/etc/arrsync.env")));
        assert_eq!(cli.log_format.map(LogFormat::from), Some(LogFormat::Json));
        assert!(Cli::try_parse_from(["arrsync", "--log-format", "xml"]).is_err());
    }
}
