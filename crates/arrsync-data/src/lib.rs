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

//! Persistence layer for arrsync: embedded migrations and the per-service ledger.

pub mod error;
pub mod ledger;
pub mod pool;

pub use error::{DataError, Result as DataResult};
pub use ledger::LedgerStore;
pub use pool::open_pool;
