//! # Design
//!
//! - Centralize application-level errors for startup and run wiring.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: arrsync_config::ConfigError,
    },
    /// An explicitly requested dotenv file does not exist.
    #[error("environment file not found")]
    EnvFileMissing {
        /// Requested path.
        path: PathBuf,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: arrsync_telemetry::TelemetryError,
    },
    /// Ledger database could not be opened or migrated.
    #[error("ledger operation failed")]
    Data {
        /// Operation identifier.
        operation: &'static str,
        /// Source data-layer error.
        source: arrsync_data::DataError,
    },
    /// Permission policy could not be resolved.
    #[error("filesystem policy failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source fsops error.
        source: arrsync_fsops::FsOpsError,
    },
    /// An adapter could not be constructed.
    #[error("adapter construction failed")]
    Client {
        /// Operation identifier.
        operation: &'static str,
        /// Source adapter error.
        source: arrsync_clients::ClientError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// Required dependency was missing.
    #[error("missing dependency")]
    MissingDependency {
        /// Name of the missing dependency.
        name: &'static str,
    },
    /// Lock record could not be serialised.
    #[error("lock record serialization failed")]
    LockRecord {
        /// Source JSON error.
        source: serde_json::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: arrsync_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: arrsync_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn data(operation: &'static str, source: arrsync_data::DataError) -> Self {
        Self::Data { operation, source }
    }

    pub(crate) const fn fsops(operation: &'static str, source: arrsync_fsops::FsOpsError) -> Self {
        Self::FsOps { operation, source }
    }

    /// Wrap an adapter construction failure.
    #[must_use]
    pub const fn client(operation: &'static str, source: arrsync_clients::ClientError) -> Self {
        Self::Client { operation, source }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "config.load",
            arrsync_config::ConfigError::MissingField {
                field: "SEEDBOX_ENDPOINT",
                required_by: "enabled service",
            },
        );
        assert!(matches!(config, AppError::Config { .. }));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());

        let io = AppError::io("lock.open", "/run/arrsync.lock", io::Error::other("denied"));
        assert!(matches!(io, AppError::Io { .. }));
        assert!(io.source().is_some());

        let fsops = AppError::fsops(
            "fsops.policy",
            arrsync_fsops::FsOpsError::InvalidInput {
                field: "owner",
                reason: "not_found",
                value: None,
            },
        );
        assert!(matches!(fsops, AppError::FsOps { .. }));

        let client = AppError::client(
            "clients.arr",
            arrsync_clients::ClientError::InvalidEndpoint {
                url: "mailto:x".to_string(),
            },
        );
        assert!(matches!(client, AppError::Client { .. }));
    }
}
