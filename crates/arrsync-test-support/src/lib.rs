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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (temporary directories and file trees), sqlite.rs (throwaway ledger databases).

pub mod fixtures;
pub mod sqlite;
