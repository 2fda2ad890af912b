//! Startup sequence and per-run wiring.
//!
//! # Design
//! - `run_app` owns everything that touches the process: flags, dotenv,
//!   environment and the global subscriber.
//! - `run_once` takes an explicit [`AppConfig`] and an [`AdapterFactory`] so a
//!   whole run can be driven against fakes.

use std::path::Path;
use std::sync::Arc;

use arrsync_clients::{ArrClient, RemoteShell, RsyncCopier, SshLister, WebhookNotifier};
use arrsync_config::{AppConfig, ConfigLoader, ServiceConfig, load_env_file};
use arrsync_core::{
    Ledger, Notifier, PermissionAdjuster, RunCycle, RunSummary, ServiceCollaborators,
    ServicePipeline,
};
use arrsync_data::{LedgerStore, open_pool};
use arrsync_fsops::FsPermissionAdjuster;
use arrsync_telemetry::{LogFormat, LoggingConfig, Metrics, build_sha, init_logging};
use chrono::Utc;
use clap::Parser;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::cli::{Cli, DEFAULT_ENV_FILE};
use crate::error::{AppError, AppResult};
use crate::lock::RunLock;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// Another run held the lock; nothing was done.
    Locked,
    /// Both pipelines ran; partial failures are in the summary.
    Completed(RunSummary),
}

/// Builds the adapters a run talks to.
pub trait AdapterFactory {
    /// Adapters for one enabled service, bound to that service's ledger.
    ///
    /// # Errors
    ///
    /// Returns an error when an adapter cannot be constructed.
    fn collaborators(
        &self,
        service: &ServiceConfig,
        ledger: Arc<dyn Ledger>,
    ) -> AppResult<ServiceCollaborators>;

    /// Notifier for the run, or `None` when notifications are disabled.
    ///
    /// # Errors
    ///
    /// Returns an error when the notifier cannot be constructed.
    fn notifier(&self) -> AppResult<Option<Arc<dyn Notifier>>>;
}

/// Production adapters: HTTP queue clients, ssh, rsync and the filesystem.
pub struct SystemAdapters {
    shell: Option<RemoteShell>,
    permissions: Arc<dyn PermissionAdjuster>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl SystemAdapters {
    /// Resolve the permission policy and build the shared adapters.
    ///
    /// # Errors
    ///
    /// Returns an error when the owner or group cannot be resolved or the
    /// notifier's HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let adjuster = FsPermissionAdjuster::from_policy(&config.permissions)
            .map_err(|err| AppError::fsops("permissions.resolve", err))?;
        let notifier = config
            .notification
            .as_ref()
            .map(WebhookNotifier::new)
            .transpose()
            .map_err(|err| AppError::client("notifier.new", err))?
            .map(|notifier| Arc::new(notifier) as Arc<dyn Notifier>);

        Ok(Self {
            shell: config.seedbox.as_ref().map(RemoteShell::from_config),
            permissions: Arc::new(adjuster),
            notifier,
        })
    }
}

impl AdapterFactory for SystemAdapters {
    fn collaborators(
        &self,
        service: &ServiceConfig,
        ledger: Arc<dyn Ledger>,
    ) -> AppResult<ServiceCollaborators> {
        let shell = self
            .shell
            .clone()
            .ok_or(AppError::MissingDependency { name: "seedbox" })?;
        let queue = ArrClient::new(service).map_err(|err| AppError::client("arr.new", err))?;

        Ok(ServiceCollaborators {
            queue: Arc::new(queue),
            lister: Arc::new(SshLister::new(shell.clone())),
            ledger,
            copier: Arc::new(RsyncCopier::new(shell)),
            permissions: Arc::clone(&self.permissions),
        })
    }

    fn notifier(&self) -> AppResult<Option<Arc<dyn Notifier>>> {
        Ok(self.notifier.clone())
    }
}

/// Entry point for the `arrsync` binary.
///
/// # Errors
///
/// Returns an error for fatal startup failures: a missing `--env-file`, invalid
/// configuration, logging installation, an unopenable ledger or lock file.
pub async fn run_app() -> AppResult<()> {
    let cli = Cli::parse();
    seed_environment(cli.env_file.as_deref())?;

    let config = ConfigLoader::from_env()
        .load()
        .map_err(|err| AppError::config("config.load", err))?;

    let format = cli
        .log_format
        .map(LogFormat::from)
        .or(config.logging.format)
        .unwrap_or_else(LogFormat::infer);
    let sha = option_env!("ARRSYNC_BUILD_SHA").unwrap_or("dev");
    let _guard = init_logging(&LoggingConfig {
        level: &config.logging.level,
        format,
        build_sha: sha,
        file: config.logging.file.as_deref(),
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    let run_id = Uuid::new_v4();
    let span = info_span!("run", %run_id, build_sha = build_sha());
    async {
        let adapters = SystemAdapters::from_config(&config)?;
        let report = run_once(&config, run_id, &adapters).await?;
        if let RunReport::Completed(summary) = &report {
            info!(
                services = summary.outcomes.len(),
                notified = summary.delivered,
                "run finished"
            );
        }
        Ok::<(), AppError>(())
    }
    .instrument(span)
    .await
}

fn seed_environment(explicit: Option<&Path>) -> AppResult<()> {
    let path = explicit.unwrap_or_else(|| Path::new(DEFAULT_ENV_FILE));
    let loaded = load_env_file(path).map_err(|err| AppError::config("config.env_file", err))?;
    if !loaded && explicit.is_some() {
        return Err(AppError::EnvFileMissing {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Execute one reconciliation run.
///
/// # Errors
///
/// Returns an error when the lock file, metrics registry or ledger database
/// cannot be set up, or an adapter cannot be built. Failures inside the
/// pipelines are logged and reported in the summary instead.
pub async fn run_once(
    config: &AppConfig,
    run_id: Uuid,
    factory: &dyn AdapterFactory,
) -> AppResult<RunReport> {
    let Some(_lock) = RunLock::acquire(&config.lock_path, run_id)? else {
        let holder = RunLock::holder(&config.lock_path);
        error!(
            path = %config.lock_path.display(),
            holder_pid = holder.as_ref().map(|record| record.pid),
            holder_run = ?holder.as_ref().map(|record| record.run_id),
            "another run holds the lock; exiting"
        );
        return Ok(RunReport::Locked);
    };

    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let pool = open_pool(&config.database_path)
        .await
        .map_err(|err| AppError::data("ledger.open", err))?;
    LedgerStore::migrate(&pool)
        .await
        .map_err(|err| AppError::data("ledger.migrate", err))?;

    let mut pipelines = Vec::new();
    for service in config.services() {
        let store = LedgerStore::for_service(pool.clone(), service.kind)
            .await
            .map_err(|err| AppError::data("ledger.bind", err))?;
        let ledger: Arc<dyn Ledger> = Arc::new(store);
        let collaborators = factory.collaborators(service, ledger)?;
        pipelines.push(ServicePipeline::new(
            service.context(),
            collaborators,
            metrics.clone(),
        ));
    }
    if pipelines.is_empty() {
        warn!("no service is configured; nothing to reconcile");
    }

    let summary = RunCycle::new(pipelines, factory.notifier()?).run().await;

    metrics.set_last_run(Utc::now().timestamp());
    if let Some(path) = config.metrics_textfile.as_deref() {
        match metrics.write_textfile(path) {
            Ok(()) => debug!(path = %path.display(), "metrics textfile written"),
            Err(err) => warn!(
                error = %err,
                path = %path.display(),
                "failed to write metrics textfile"
            ),
        }
    }
    pool.close().await;

    Ok(RunReport::Completed(summary))
}
