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

//! Reconciliation core for arrsync: the per-item transfer lifecycle shared by
//! every upstream service.
//!
//! Layout: `model/` (domain types), `collaborators.rs` (adapter traits),
//! `normalize.rs` and `presence.rs` (candidate construction), `engine.rs`
//! (decision table, completion and purge), `purge.rs` (local deletion),
//! `dispatch.rs` (transfer and notification), `pipeline.rs` (run wiring).

pub mod collaborators;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod presence;
pub mod purge;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use collaborators::{
    BulkCopier, Ledger, Notifier, PermissionAdjuster, QueueSource, RemoteLister,
};
pub use dispatch::{Notification, ServiceOutcome, compose_message};
pub use engine::{ReconcileReport, ReconciliationEngine, decide};
pub use error::{SyncError, SyncResult};
pub use model::{
    CandidateItem, Decision, LedgerEntry, QueuePage, QueueRecord, RETRY_CEILING, RemoteListing,
    ServiceContext, ServiceKind, Severity, SourceSnapshot, TransferOutcome,
};
pub use normalize::normalize_queue;
pub use pipeline::{RunCycle, RunSummary, ServiceCollaborators, ServicePipeline};
pub use presence::filter_present;
pub use purge::{PurgeOutcome, purge_local};
