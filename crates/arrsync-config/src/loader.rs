//! Builds [`AppConfig`] from environment variables.
//!
//! # Design
//! - Variables are read through a lookup function so tests never touch the
//!   process environment.
//! - Empty values count as unset.
//! - A service with an empty endpoint or API key is disabled, not an error.

use std::path::{Path, PathBuf};

use arrsync_core::ServiceKind;
use tracing::{debug, warn};

use crate::defaults::{
    DEFAULT_APPRISE_TAG, DEFAULT_DB_PATH, DEFAULT_LOCK_FILE, DEFAULT_SEEDBOX_PORT,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    AppConfig, LogSettings, NotificationConfig, PermissionPolicy, SeedboxConfig, ServiceConfig,
};
use crate::validate::{
    parse_http_url, parse_level, parse_log_format, parse_notification_service, parse_octal_mode,
    parse_port,
};

const ENABLED_SERVICE: &str = "enabled service";

/// Variable names for one service.
struct ServiceVars {
    endpoint: &'static str,
    api_key: &'static str,
    destination: &'static str,
    remote_root: &'static str,
}

const fn service_vars(kind: ServiceKind) -> ServiceVars {
    match kind {
        ServiceKind::Sonarr => ServiceVars {
            endpoint: "SONARR_ENDPOINT",
            api_key: "SONARR_API_KEY",
            destination: "SONARR_DEST_DIR",
            remote_root: "SEEDBOX_SONARR_TORRENT_PATH",
        },
        ServiceKind::Radarr => ServiceVars {
            endpoint: "RADARR_ENDPOINT",
            api_key: "RADARR_API_KEY",
            destination: "RADARR_DEST_DIR",
            remote_root: "SEEDBOX_RADARR_TORRENT_PATH",
        },
    }
}

/// Reads configuration through a variable lookup.
pub struct ConfigLoader<F> {
    lookup: F,
}

impl ConfigLoader<fn(&str) -> Option<String>> {
    /// Loader backed by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            lookup: process_env,
        }
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl<F> ConfigLoader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Loader backed by an arbitrary lookup function.
    pub const fn from_lookup(lookup: F) -> Self {
        Self { lookup }
    }

    /// Read and validate every setting.
    ///
    /// # Errors
    ///
    /// Returns the first invalid or missing value.
    pub fn load(&self) -> ConfigResult<AppConfig> {
        let sonarr = self.service(ServiceKind::Sonarr)?;
        let radarr = self.service(ServiceKind::Radarr)?;
        let seedbox = if sonarr.is_some() || radarr.is_some() {
            Some(self.seedbox()?)
        } else {
            warn!("no service has both an endpoint and an API key; nothing will be reconciled");
            None
        };

        let database_path = self
            .get("DB_PATH")
            .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from);
        let lock_path = self
            .get("LOCK_PATH")
            .map_or_else(|| default_lock_path(&database_path), PathBuf::from);

        Ok(AppConfig {
            sonarr,
            radarr,
            seedbox,
            notification: self.notification()?,
            permissions: self.permissions()?,
            logging: self.logging()?,
            database_path,
            lock_path,
            metrics_textfile: self.get("METRICS_TEXTFILE").map(PathBuf::from),
        })
    }

    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn require(&self, key: &'static str, required_by: &'static str) -> ConfigResult<String> {
        self.get(key).ok_or(ConfigError::MissingField {
            field: key,
            required_by,
        })
    }

    fn service(&self, kind: ServiceKind) -> ConfigResult<Option<ServiceConfig>> {
        let vars = service_vars(kind);
        let (Some(endpoint), Some(api_key)) = (self.get(vars.endpoint), self.get(vars.api_key))
        else {
            debug!(service = %kind, "service disabled: endpoint or API key unset");
            return Ok(None);
        };

        Ok(Some(ServiceConfig {
            kind,
            endpoint: parse_http_url(vars.endpoint, &endpoint)?,
            api_key,
            destination: PathBuf::from(self.require(vars.destination, vars.endpoint)?),
            remote_root: self.require(vars.remote_root, vars.endpoint)?,
        }))
    }

    fn seedbox(&self) -> ConfigResult<SeedboxConfig> {
        let port = match self.get("SEEDBOX_PORT") {
            Some(raw) => parse_port("SEEDBOX_PORT", &raw)?,
            None => DEFAULT_SEEDBOX_PORT,
        };
        Ok(SeedboxConfig {
            user: self.require("SEEDBOX_USERNAME", ENABLED_SERVICE)?,
            host: self.require("SEEDBOX_ENDPOINT", ENABLED_SERVICE)?,
            port,
        })
    }

    fn notification(&self) -> ConfigResult<Option<NotificationConfig>> {
        let Some(raw_service) = self.get("NOTIFICATION_SERVICE") else {
            return Ok(None);
        };
        let service = parse_notification_service("NOTIFICATION_SERVICE", &raw_service)?;
        let Some(raw_url) = self.get("WEBHOOK_URL") else {
            warn!(service = %raw_service, "notifications disabled: WEBHOOK_URL unset");
            return Ok(None);
        };

        Ok(Some(NotificationConfig {
            service,
            url: parse_http_url("WEBHOOK_URL", &raw_url)?,
            apprise_tag: self
                .get("APPRISE_TAG")
                .unwrap_or_else(|| DEFAULT_APPRISE_TAG.to_string()),
        }))
    }

    fn permissions(&self) -> ConfigResult<PermissionPolicy> {
        let mode = self
            .get("CHMOD")
            .map(|raw| parse_octal_mode("CHMOD", &raw))
            .transpose()?;
        Ok(PermissionPolicy {
            mode,
            owner: self.get("CHOWN_UID"),
            group: self.get("CHOWN_GID"),
        })
    }

    fn logging(&self) -> ConfigResult<LogSettings> {
        let level = match self.get("VERBOSE") {
            Some(raw) => parse_level("VERBOSE", &raw)?,
            None => arrsync_telemetry::DEFAULT_LOG_LEVEL.to_string(),
        };
        let format = self
            .get("LOG_FORMAT")
            .map(|raw| parse_log_format("LOG_FORMAT", &raw))
            .transpose()?;
        Ok(LogSettings {
            level,
            format,
            file: self.get("LOG_FILE").map(PathBuf::from),
        })
    }
}

fn default_lock_path(database_path: &Path) -> PathBuf {
    database_path
        .parent()
        .map_or_else(|| PathBuf::from(DEFAULT_LOCK_FILE), |dir| dir.join(DEFAULT_LOCK_FILE))
}

/// Seed the process environment from a dotenv file. Variables already set win.
///
/// Returns `false` when the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::EnvFile`] when the file exists but cannot be parsed.
pub fn load_env_file(path: &Path) -> ConfigResult<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ConfigError::EnvFile {
            path: path.to_path_buf(),
            source,
        }),
    }
}
