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

//! Filesystem post-processing for transferred items.
//!
//! Layout: `error.rs` (structured errors), `permissions.rs` (mode and ownership walker).

pub mod error;
pub mod permissions;

pub use error::{FsOpsError, FsOpsResult};
pub use permissions::{AdjustSummary, FsPermissionAdjuster};
