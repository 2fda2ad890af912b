//! Fallback values for optional settings.

/// Ledger database location when `DB_PATH` is unset.
pub const DEFAULT_DB_PATH: &str = "db/database.db";
/// Lock file name, placed next to the ledger database when `LOCK_PATH` is unset.
pub const DEFAULT_LOCK_FILE: &str = "arrsync.lock";
/// Remote shell port when `SEEDBOX_PORT` is unset.
pub const DEFAULT_SEEDBOX_PORT: u16 = 22;
/// Tag used for Apprise deliveries when `APPRISE_TAG` is unset.
pub(crate) const DEFAULT_APPRISE_TAG: &str = "all";
