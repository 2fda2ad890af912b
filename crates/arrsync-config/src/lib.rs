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

//! Startup configuration for arrsync, read once from the environment.
//!
//! Layout: `model.rs` (typed configuration), `loader.rs` (environment and
//! dotenv sourcing), `validate.rs` (field parsers), `defaults.rs` (fallback
//! values).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use defaults::{DEFAULT_DB_PATH, DEFAULT_LOCK_FILE, DEFAULT_SEEDBOX_PORT};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_env_file};
pub use model::{
    AppConfig, LogSettings, NotificationConfig, NotificationService, PermissionPolicy,
    SeedboxConfig, ServiceConfig,
};
