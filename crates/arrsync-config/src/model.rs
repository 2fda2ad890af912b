//! Typed configuration assembled at startup.

use std::path::PathBuf;

use arrsync_core::{ServiceContext, ServiceKind};
use arrsync_telemetry::LogFormat;
use serde::{Deserialize, Serialize};
use url::Url;

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Sonarr pipeline, when enabled.
    pub sonarr: Option<ServiceConfig>,
    /// Radarr pipeline, when enabled.
    pub radarr: Option<ServiceConfig>,
    /// Remote host; present whenever at least one service is enabled.
    pub seedbox: Option<SeedboxConfig>,
    /// Outbound notifications, when enabled.
    pub notification: Option<NotificationConfig>,
    /// Mode and ownership applied to transferred items.
    pub permissions: PermissionPolicy,
    /// Logging options.
    pub logging: LogSettings,
    /// Ledger database file.
    pub database_path: PathBuf,
    /// Advisory lock file guarding against overlapping runs.
    pub lock_path: PathBuf,
    /// Prometheus textfile written after each run.
    pub metrics_textfile: Option<PathBuf>,
}

impl AppConfig {
    /// Configuration for `kind`, if that service is enabled.
    #[must_use]
    pub const fn service(&self, kind: ServiceKind) -> Option<&ServiceConfig> {
        match kind {
            ServiceKind::Sonarr => self.sonarr.as_ref(),
            ServiceKind::Radarr => self.radarr.as_ref(),
        }
    }

    /// Enabled services in run order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceConfig> {
        ServiceKind::ALL
            .into_iter()
            .filter_map(|kind| self.service(kind))
    }
}

/// One upstream service and where its items land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Service identity.
    pub kind: ServiceKind,
    /// Base URL of the service's HTTP API.
    pub endpoint: Url,
    /// Value sent in the `X-Api-Key` header.
    pub api_key: String,
    /// Local directory that receives transferred items.
    pub destination: PathBuf,
    /// Directory on the seedbox holding this service's downloads.
    pub remote_root: String,
}

impl ServiceConfig {
    /// Pipeline context for this service.
    #[must_use]
    pub fn context(&self) -> ServiceContext {
        ServiceContext::new(self.kind, self.remote_root.clone(), self.destination.clone())
    }
}

/// Remote shell target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedboxConfig {
    /// Login name.
    pub user: String,
    /// Host name or address.
    pub host: String,
    /// SSH port.
    pub port: u16,
}

impl SeedboxConfig {
    /// `user@host` destination used by ssh and rsync.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Supported notification backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationService {
    /// Discord webhook with an embed payload.
    Discord,
    /// Apprise API `notify` endpoint.
    Apprise,
}

/// Outbound notification target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Backend payload format.
    pub service: NotificationService,
    /// Webhook or Apprise URL.
    pub url: Url,
    /// Apprise tag selector.
    pub apprise_tag: String,
}

/// Mode and ownership applied after each transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionPolicy {
    /// Mode applied recursively.
    pub mode: Option<u32>,
    /// Owner as a numeric id or user name.
    pub owner: Option<String>,
    /// Group as a numeric id or group name.
    pub group: Option<String>,
}

impl PermissionPolicy {
    /// Whether the policy changes nothing.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.mode.is_none() && self.owner.is_none() && self.group.is_none()
    }
}

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Level used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format; inferred from the build profile when unset.
    pub format: Option<LogFormat>,
    /// Optional file mirroring every event.
    pub file: Option<PathBuf>,
}
