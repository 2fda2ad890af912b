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

//! Concrete adapters behind the reconciliation core's collaborator traits.
//!
//! Layout: `arr.rs` (download-queue HTTP client), `notify.rs` (webhook
//! notifier), `shell.rs` (remote shell target and process helpers),
//! `lister.rs` (remote listing over ssh), `rsync.rs` (bulk copier).

pub mod arr;
pub mod error;
pub mod lister;
pub mod notify;
pub mod rsync;
pub mod shell;

pub use arr::ArrClient;
pub use error::{ClientError, ClientResult};
pub use lister::SshLister;
pub use notify::WebhookNotifier;
pub use rsync::RsyncCopier;
pub use shell::{RemoteShell, shell_quote};
