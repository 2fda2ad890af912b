#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

//! Telemetry primitives shared across the arrsync workspace.
//! Layout: init.rs (subscriber installation), metrics.rs (run counters), error.rs (telemetry errors).

pub mod error;
pub mod init;
pub mod metrics;

pub use error::{Result, TelemetryError};
pub use init::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, LoggingGuard, build_sha, init_logging,
};
pub use metrics::{Metrics, MetricsSnapshot};
