//! Whole-run tests: real ledger database, lock file and metrics textfile with
//! in-memory adapters standing in for the network and the seedbox.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrsync_app::lock::RunLock;
use arrsync_app::{AdapterFactory, AppResult, RunReport, run_once};
use arrsync_config::{AppConfig, LogSettings, PermissionPolicy, ServiceConfig};
use arrsync_core::testing::{
    RecordingAdjuster, RecordingCopier, RecordingNotifier, StaticLister, StaticQueue,
    pending_record,
};
use arrsync_core::{
    Ledger, Notifier, RemoteListing, ServiceCollaborators, ServiceKind, Severity, TransferOutcome,
};
use arrsync_test_support::fixtures::temp_dir;
use sqlx::{Row, SqlitePool};
use url::Url;
use uuid::Uuid;

struct Workspace {
    _root: tempfile::TempDir,
    config: AppConfig,
}

fn service(kind: ServiceKind, destination: PathBuf) -> anyhow::Result<ServiceConfig> {
    Ok(ServiceConfig {
        kind,
        endpoint: Url::parse("http://arr.invalid:8989")?,
        api_key: "secret".to_string(),
        destination,
        remote_root: format!("/home/seed/{}", kind.root_token()),
    })
}

fn workspace() -> anyhow::Result<Workspace> {
    let root = temp_dir("arrsync-run")?;
    let sonarr_dest = root.path().join("tv");
    let radarr_dest = root.path().join("movies");
    std::fs::create_dir_all(&sonarr_dest)?;
    std::fs::create_dir_all(&radarr_dest)?;

    let config = AppConfig {
        sonarr: Some(service(ServiceKind::Sonarr, sonarr_dest)?),
        radarr: Some(service(ServiceKind::Radarr, radarr_dest)?),
        seedbox: None,
        notification: None,
        permissions: PermissionPolicy::default(),
        logging: LogSettings {
            level: "error".to_string(),
            format: None,
            file: None,
        },
        database_path: root.path().join("db").join("database.db"),
        lock_path: root.path().join("db").join("arrsync.lock"),
        metrics_textfile: Some(root.path().join("metrics").join("arrsync.prom")),
    };
    Ok(Workspace {
        _root: root,
        config,
    })
}

/// Sonarr sees `sonarr_queue`; Radarr's queue is down.
struct FakeAdapters {
    sonarr_queue: Vec<&'static str>,
    listing: RemoteListing,
    copier: Arc<RecordingCopier>,
    adjuster: Arc<RecordingAdjuster>,
    notifier: Arc<RecordingNotifier>,
}

impl FakeAdapters {
    fn new(sonarr_queue: Vec<&'static str>, listing: RemoteListing) -> Self {
        Self {
            sonarr_queue,
            listing,
            copier: Arc::new(RecordingCopier::new(TransferOutcome::succeeded(""))),
            adjuster: Arc::new(RecordingAdjuster::new()),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }
}

impl AdapterFactory for FakeAdapters {
    fn collaborators(
        &self,
        service: &ServiceConfig,
        ledger: Arc<dyn Ledger>,
    ) -> AppResult<ServiceCollaborators> {
        let queue = match service.kind {
            ServiceKind::Sonarr => StaticQueue::records(
                self.sonarr_queue
                    .iter()
                    .map(|path| pending_record(path))
                    .collect(),
            ),
            ServiceKind::Radarr => StaticQueue::unavailable(),
        };
        Ok(ServiceCollaborators {
            queue: Arc::new(queue),
            lister: Arc::new(StaticLister::new(self.listing.clone())),
            ledger,
            copier: self.copier.clone(),
            permissions: self.adjuster.clone(),
        })
    }

    fn notifier(&self) -> AppResult<Option<Arc<dyn Notifier>>> {
        let notifier: Arc<dyn Notifier> = self.notifier.clone();
        Ok(Some(notifier))
    }
}

async fn ledger_pool(path: &Path) -> anyhow::Result<SqlitePool> {
    Ok(arrsync_data::open_pool(path).await?)
}

type RowFlags = (i64, bool, bool, bool);

async fn row_flags(pool: &SqlitePool, table: &str, name: &str) -> anyhow::Result<RowFlags> {
    let row = sqlx::query(&format!(
        "SELECT retries, import_complete, notified, purged FROM {table} WHERE torrent_name = ?1"
    ))
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok((
        row.try_get("retries")?,
        row.try_get("import_complete")?,
        row.try_get("notified")?,
        row.try_get("purged")?,
    ))
}

#[tokio::test]
async fn first_sighting_transfers_notifies_and_writes_metrics() -> anyhow::Result<()> {
    let ws = workspace()?;
    let adapters = FakeAdapters::new(
        vec!["/data/tv-sonarr/Show.S01", "/data/tv-sonarr/Missing.S02"],
        RemoteListing::new(["Show.S01"], Vec::<String>::new()),
    );

    let report = run_once(&ws.config, Uuid::new_v4(), &adapters).await?;
    let RunReport::Completed(summary) = report else {
        anyhow::bail!("run unexpectedly reported the lock as held");
    };
    assert_eq!(summary.outcomes.len(), 2);
    assert!(summary.delivered);

    let calls = adapters.copier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, vec!["/home/seed/tv-sonarr/Show.S01".to_string()]);
    let sonarr_dest = ws.config.sonarr.as_ref().map(|svc| svc.destination.clone());
    assert_eq!(Some(calls[0].1.clone()), sonarr_dest);
    assert_eq!(adapters.adjuster.calls().len(), 2);

    let sent = adapters.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, Severity::Message);
    assert!(sent[0].0.contains("Transferred 1 new Sonarr torrents:"));
    assert!(sent[0].0.contains("Show.S01"));

    let pool = ledger_pool(&ws.config.database_path).await?;
    assert_eq!(
        row_flags(&pool, "tbl_sonarr", "Show.S01").await?,
        (1, false, true, false)
    );
    let missing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM tbl_sonarr WHERE torrent_name = 'Missing.S02'")
            .fetch_one(&pool)
            .await?;
    assert_eq!(missing, 0);
    let radarr_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tbl_radarr")
        .fetch_one(&pool)
        .await?;
    assert_eq!(radarr_rows, 0);
    pool.close().await;

    let textfile = ws.config.metrics_textfile.as_deref().unwrap();
    let metrics = std::fs::read_to_string(textfile)?;
    assert!(metrics.contains("arrsync_items_transferred_total{service=\"sonarr\"} 1"));
    assert!(metrics.contains("arrsync_source_unavailable_total{service=\"radarr\"} 1"));
    assert!(metrics.contains("arrsync_last_run_timestamp_seconds"));
    Ok(())
}

#[tokio::test]
async fn vanished_item_is_completed_and_purged_on_next_run() -> anyhow::Result<()> {
    let ws = workspace()?;
    let listing = RemoteListing::new(["Show.S01"], Vec::<String>::new());

    let first = FakeAdapters::new(vec!["/data/tv-sonarr/Show.S01"], listing.clone());
    run_once(&ws.config, Uuid::new_v4(), &first).await?;

    let local = ws.config.sonarr.as_ref().unwrap().destination.join("Show.S01");
    std::fs::create_dir_all(local.join("Season 1"))?;
    std::fs::write(local.join("Season 1").join("e01.mkv"), b"video")?;

    let second = FakeAdapters::new(Vec::new(), listing);
    let report = run_once(&ws.config, Uuid::new_v4(), &second).await?;
    assert!(matches!(report, RunReport::Completed(_)));
    assert!(second.copier.calls().is_empty());
    assert!(second.notifier.sent().is_empty());
    assert!(!local.exists());

    let pool = ledger_pool(&ws.config.database_path).await?;
    assert_eq!(
        row_flags(&pool, "tbl_sonarr", "Show.S01").await?,
        (1, true, true, true)
    );
    let completed_on: Option<String> =
        sqlx::query_scalar("SELECT completed_on FROM tbl_sonarr WHERE torrent_name = 'Show.S01'")
            .fetch_one(&pool)
            .await?;
    assert!(completed_on.is_some());
    pool.close().await;
    Ok(())
}

#[tokio::test]
async fn held_lock_skips_the_run() -> anyhow::Result<()> {
    let ws = workspace()?;
    let holder = Uuid::new_v4();
    let _held = RunLock::acquire(&ws.config.lock_path, holder)?.expect("lock is free");

    let adapters = FakeAdapters::new(
        vec!["/data/tv-sonarr/Show.S01"],
        RemoteListing::new(["Show.S01"], Vec::<String>::new()),
    );
    let report = run_once(&ws.config, Uuid::new_v4(), &adapters).await?;

    assert_eq!(report, RunReport::Locked);
    assert!(adapters.copier.calls().is_empty());
    assert!(!ws.config.database_path.exists());
    assert_eq!(
        RunLock::holder(&ws.config.lock_path).map(|record| record.run_id),
        Some(holder)
    );
    Ok(())
}

#[tokio::test]
async fn database_from_earlier_release_keeps_tracking_new_items() -> anyhow::Result<()> {
    let ws = workspace()?;
    let pool = ledger_pool(&ws.config.database_path).await?;
    sqlx::query(
        "CREATE TABLE tbl_sonarr (
            id INTEGER NOT NULL,
            torrent_name VARCHAR NOT NULL,
            retries INTEGER NOT NULL,
            import_complete BOOLEAN NOT NULL,
            notified BOOLEAN NOT NULL,
            completed_on DATETIME,
            purged BOOLEAN NOT NULL,
            is_dir BOOLEAN NOT NULL,
            PRIMARY KEY (id)
        )",
    )
    .execute(&pool)
    .await?;
    pool.close().await;

    let adapters = FakeAdapters::new(
        vec!["/data/tv-sonarr/Show.S01"],
        RemoteListing::new(["Show.S01"], Vec::<String>::new()),
    );
    run_once(&ws.config, Uuid::new_v4(), &adapters).await?;

    assert_eq!(adapters.copier.calls().len(), 1);
    let pool = ledger_pool(&ws.config.database_path).await?;
    assert_eq!(
        row_flags(&pool, "tbl_sonarr", "Show.S01").await?,
        (1, false, true, false)
    );
    pool.close().await;
    Ok(())
}
