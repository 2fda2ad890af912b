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

//! arrsync application wiring.
//!
//! Layout: `cli.rs` (flags), `lock.rs` (single-run guard), `bootstrap.rs`
//! (configuration, logging and adapter wiring), `error.rs` (application errors).

pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod lock;

pub use bootstrap::{AdapterFactory, RunReport, SystemAdapters, run_app, run_once};
pub use error::{AppError, AppResult};
