#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs)]

//! Binary entrypoint: one reconciliation run, then exit.

use arrsync_app::{AppResult, run_app};

/// Runs both service pipelines once on a single-threaded runtime.
#[tokio::main(flavor = "current_thread")]
async fn main() -> AppResult<()> {
    run_app().await
}
