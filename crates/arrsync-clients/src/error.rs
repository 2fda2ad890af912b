//! # Design
//!
//! - Constant messages; request and process context lives in fields.
//! - HTTP status failures stay distinguishable from transport and decode failures.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type for adapter calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised by the HTTP and process adapters.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP client could not be constructed.
    #[error("failed to build http client")]
    ClientBuild {
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// Configured endpoint cannot carry a path.
    #[error("invalid endpoint")]
    InvalidEndpoint {
        /// Offending endpoint.
        url: String,
    },
    /// Request could not be sent or the response body not read.
    #[error("http request failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// Server answered with a non-success status.
    #[error("unexpected http status")]
    HttpStatus {
        /// Operation identifier.
        operation: &'static str,
        /// Status code returned.
        status: u16,
    },
    /// Response body did not match the expected shape.
    #[error("failed to decode response")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// External program could not be started.
    #[error("failed to spawn command")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// External program exited unsuccessfully.
    #[error("command exited unsuccessfully")]
    CommandFailed {
        /// Program name.
        program: String,
        /// Exit code, absent when killed by a signal.
        status: Option<i32>,
        /// Trimmed standard error.
        stderr: String,
    },
    /// External program did not finish in time.
    #[error("command timed out")]
    Timeout {
        /// Program name.
        program: String,
        /// Limit that elapsed.
        after: Duration,
    },
}

impl ClientError {
    /// Message followed by every source in the chain, for operator-facing text.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        text
    }
}
