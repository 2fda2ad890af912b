//! # Design
//!
//! - Collaborators surface failures through one enum so the pipeline can log and continue.
//! - Messages stay constant; context lives in fields and the boxed source.

use std::error::Error;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::ServiceKind;

/// Boxed source carried by collaborator failures.
pub type BoxedSource = Box<dyn Error + Send + Sync>;

/// Convenience alias for reconciliation results.
pub type SyncResult<T> = Result<T, SyncError>;

/// Failures raised while gathering state or applying side effects.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The download-queue API could not be read or decoded.
    #[error("queue source unavailable")]
    QueueUnavailable {
        /// Service whose queue failed.
        service: ServiceKind,
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: BoxedSource,
    },
    /// The remote listing could not be produced.
    #[error("remote listing unavailable")]
    RemoteUnavailable {
        /// Operation identifier.
        operation: &'static str,
        /// Remote root being listed.
        root: String,
        /// Underlying failure.
        #[source]
        source: BoxedSource,
    },
    /// A ledger call failed and was rolled back.
    #[error("ledger operation failed")]
    Ledger {
        /// Operation identifier.
        operation: &'static str,
        /// Ledger key when the call was scoped to one row.
        torrent_name: Option<String>,
        /// Underlying failure.
        #[source]
        source: BoxedSource,
    },
    /// Adjusting ownership or mode of transferred items failed.
    #[error("permission adjustment failed")]
    Permissions {
        /// Operation identifier.
        operation: &'static str,
        /// Path being adjusted.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: BoxedSource,
    },
    /// The notifier rejected or failed to deliver a message.
    #[error("notification delivery failed")]
    Notification {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: BoxedSource,
    },
}

impl SyncError {
    /// Wrap a queue client failure.
    pub fn queue(
        service: ServiceKind,
        operation: &'static str,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::QueueUnavailable {
            service,
            operation,
            source: source.into(),
        }
    }

    /// Wrap a remote listing failure.
    pub fn remote(operation: &'static str, root: &str, source: impl Into<BoxedSource>) -> Self {
        Self::RemoteUnavailable {
            operation,
            root: root.to_string(),
            source: source.into(),
        }
    }

    /// Wrap a ledger failure, optionally scoped to one row.
    pub fn ledger(
        operation: &'static str,
        torrent_name: Option<&str>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::Ledger {
            operation,
            torrent_name: torrent_name.map(str::to_string),
            source: source.into(),
        }
    }

    /// Wrap a permission adjuster failure.
    pub fn permissions(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::Permissions {
            operation,
            path: path.into(),
            source: source.into(),
        }
    }

    /// Wrap a notifier failure.
    pub fn notification(operation: &'static str, source: impl Into<BoxedSource>) -> Self {
        Self::Notification {
            operation,
            source: source.into(),
        }
    }
}
