//! Per-service pipeline and the run cycle that drives both services.

use std::sync::Arc;

use arrsync_telemetry::Metrics;
use tracing::{Instrument, error, info, info_span, warn};

use crate::collaborators::{
    BulkCopier, Ledger, Notifier, PermissionAdjuster, QueueSource, RemoteLister,
};
use crate::dispatch::{
    Notification, ServiceOutcome, compose_message, deliver, dispatch_transfers, record_notified,
};
use crate::engine::ReconciliationEngine;
use crate::model::{CandidateItem, ServiceContext, SourceSnapshot};
use crate::normalize::normalize_fetch;
use crate::presence::filter_present;

/// Adapters one service pipeline talks to.
#[derive(Clone)]
pub struct ServiceCollaborators {
    /// Download-queue API for the service.
    pub queue: Arc<dyn QueueSource>,
    /// Remote listing of the service's seedbox root.
    pub lister: Arc<dyn RemoteLister>,
    /// The service's ledger table.
    pub ledger: Arc<dyn Ledger>,
    /// Bulk copier into the destination directory.
    pub copier: Arc<dyn BulkCopier>,
    /// Ownership and mode fix-ups.
    pub permissions: Arc<dyn PermissionAdjuster>,
}

/// Normalise, filter, reconcile and dispatch for one service.
pub struct ServicePipeline {
    context: ServiceContext,
    collaborators: ServiceCollaborators,
    metrics: Metrics,
}

impl ServicePipeline {
    /// Bind a context to its adapters.
    #[must_use]
    pub const fn new(
        context: ServiceContext,
        collaborators: ServiceCollaborators,
        metrics: Metrics,
    ) -> Self {
        Self {
            context,
            collaborators,
            metrics,
        }
    }

    /// Context this pipeline runs with.
    #[must_use]
    pub const fn context(&self) -> &ServiceContext {
        &self.context
    }

    /// Build this run's candidate set from the queue and the remote listing.
    pub async fn gather(&self) -> SourceSnapshot {
        let service = self.context.service;
        let fetched = self.collaborators.queue.fetch_queue().await;
        let Some(candidates) = normalize_fetch(service, fetched) else {
            return SourceSnapshot::Unavailable;
        };
        if candidates.is_empty() {
            return SourceSnapshot::Available(candidates);
        }

        match self.collaborators.lister.list(&self.context.remote_root).await {
            Ok(listing) => SourceSnapshot::Available(filter_present(candidates, &listing)),
            Err(err) => {
                warn!(
                    service = %service,
                    root = %self.context.remote_root,
                    error = %err,
                    detail = ?err,
                    "remote listing failed"
                );
                SourceSnapshot::Unavailable
            }
        }
    }

    /// Run the full pipeline once.
    pub async fn run(&self) -> ServiceOutcome {
        let service = self.context.service;
        let label = service.as_str();

        let candidates = match self.gather().await {
            SourceSnapshot::Available(candidates) => candidates,
            SourceSnapshot::Unavailable => {
                self.metrics.inc_source_unavailable(label);
                warn!(service = %service, "sources unavailable; ledger left untouched this run");
                return ServiceOutcome::unavailable(service);
            }
        };

        let ledger = self.collaborators.ledger.as_ref();
        let report = ReconciliationEngine::new(&self.context, ledger)
            .reconcile(candidates)
            .await;
        self.metrics
            .add_give_ups(label, report.give_ups.len() as u64);
        self.metrics.add_completed(label, report.completed);
        self.metrics.add_purged(label, report.purged.len() as u64);
        self.metrics
            .add_purge_failures(label, report.purge_failures.len() as u64);

        if report.transfers.is_empty() {
            info!(service = %service, "no torrents to transfer");
            return ServiceOutcome {
                service,
                report: Some(report),
                transfer: None,
                announced: Vec::new(),
            };
        }

        self.adjust_permissions(&report.transfers, "before transfer");
        let transfer = dispatch_transfers(
            &self.context,
            self.collaborators.copier.as_ref(),
            &report.transfers,
        )
        .await;
        self.adjust_permissions(&report.transfers, "after transfer");

        if let Some(outcome) = transfer.as_ref() {
            self.metrics
                .add_transferred(label, report.transfers.len() as u64);
            if !outcome.success {
                self.metrics.inc_transfer_failure(label);
            }
        }

        let announced = record_notified(ledger, &report.transfers).await;
        ServiceOutcome {
            service,
            report: Some(report),
            transfer,
            announced,
        }
    }

    fn adjust_permissions(&self, items: &[CandidateItem], stage: &'static str) {
        if let Err(err) = self
            .collaborators
            .permissions
            .adjust(&self.context.destination, items)
        {
            error!(
                service = %self.context.service,
                stage,
                error = %err,
                detail = ?err,
                "failed to adjust permissions"
            );
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// One outcome per configured service, in run order.
    pub outcomes: Vec<ServiceOutcome>,
    /// The combined message, when one was due.
    pub notification: Option<Notification>,
    /// Whether the notifier accepted the message.
    pub delivered: bool,
}

/// Runs every service pipeline in turn, then notifies once.
pub struct RunCycle {
    pipelines: Vec<ServicePipeline>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl RunCycle {
    /// Assemble a cycle; a `None` notifier disables delivery.
    #[must_use]
    pub fn new(pipelines: Vec<ServicePipeline>, notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self {
            pipelines,
            notifier,
        }
    }

    /// Run every pipeline sequentially and send the combined notification.
    pub async fn run(&self) -> RunSummary {
        let mut outcomes = Vec::with_capacity(self.pipelines.len());
        for pipeline in &self.pipelines {
            let span = info_span!("service", service = %pipeline.context().service);
            outcomes.push(pipeline.run().instrument(span).await);
        }

        let notification = compose_message(&outcomes);
        let delivered = match notification.as_ref() {
            Some(notification) => deliver(self.notifier.as_deref(), notification).await,
            None => false,
        };

        RunSummary {
            outcomes,
            notification,
            delivered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RemoteListing, ServiceKind, Severity, TransferOutcome};
    use crate::testing::{
        MemoryLedger, RecordingAdjuster, RecordingCopier, RecordingNotifier, StaticLister,
        StaticQueue, ledger_entry, pending_record,
    };

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    struct Fixture {
        ledger: Arc<MemoryLedger>,
        lister: Arc<StaticLister>,
        copier: Arc<RecordingCopier>,
        adjuster: Arc<RecordingAdjuster>,
        pipeline: ServicePipeline,
    }

    fn fixture(
        service: ServiceKind,
        queue: StaticQueue,
        lister: StaticLister,
        ledger: MemoryLedger,
        outcome: TransferOutcome,
        metrics: &Metrics,
    ) -> Fixture {
        let ledger = Arc::new(ledger);
        let lister = Arc::new(lister);
        let copier = Arc::new(RecordingCopier::new(outcome));
        let adjuster = Arc::new(RecordingAdjuster::new());
        let root = format!("/seed/{}", service.root_token());
        let destination = format!("/nonexistent/arrsync/{}", service.as_str());
        let pipeline = ServicePipeline::new(
            ServiceContext::new(service, root, destination),
            ServiceCollaborators {
                queue: Arc::new(queue),
                lister: lister.clone(),
                ledger: ledger.clone(),
                copier: copier.clone(),
                permissions: adjuster.clone(),
            },
            metrics.clone(),
        );
        Fixture {
            ledger,
            lister,
            copier,
            adjuster,
            pipeline,
        }
    }

    #[tokio::test]
    async fn transfers_present_items_and_notifies_once() -> TestResult {
        let metrics = Metrics::new()?;
        let sonarr = fixture(
            ServiceKind::Sonarr,
            StaticQueue::records(vec![
                pending_record("/downloads/tv-sonarr/Show.S01/ep1.mkv"),
                pending_record("/downloads/tv-sonarr/Show.S01/ep2.mkv"),
                pending_record("/downloads/tv-sonarr/Vanished.S02"),
            ]),
            StaticLister::new(RemoteListing::new(["Show.S01"], Vec::<String>::new())),
            MemoryLedger::new(ServiceKind::Sonarr),
            TransferOutcome::succeeded(""),
            &metrics,
        );
        let notifier = Arc::new(RecordingNotifier::new());
        let cycle = RunCycle::new(vec![sonarr.pipeline], Some(notifier.clone()));

        let summary = cycle.run().await;

        assert_eq!(sonarr.lister.roots(), vec!["/seed/tv-sonarr".to_string()]);
        assert_eq!(
            sonarr.copier.calls()[0].0,
            vec!["/seed/tv-sonarr/Show.S01".to_string()]
        );
        assert_eq!(sonarr.adjuster.calls().len(), 2);
        let row = sonarr.ledger.entry("Show.S01").ok_or("row missing")?;
        assert!(row.notified);
        assert_eq!(row.retries, 1);
        assert!(summary.delivered);
        assert_eq!(
            notifier.sent(),
            vec![(
                "Transferred 1 new Sonarr torrents:\nShow.S01\n".to_string(),
                Severity::Message
            )]
        );
        assert_eq!(metrics.snapshot("sonarr").items_transferred, 1);

        let summary = cycle.run().await;
        assert!(summary.notification.is_none());
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(
            sonarr.ledger.entry("Show.S01").ok_or("row missing")?.retries,
            2
        );
        Ok(())
    }

    #[tokio::test]
    async fn failed_transfer_still_marks_notified_and_reports_error() -> TestResult {
        let metrics = Metrics::new()?;
        let radarr = fixture(
            ServiceKind::Radarr,
            StaticQueue::records(vec![pending_record("/data/radarr/Movie.2020")]),
            StaticLister::new(RemoteListing::new(["Movie.2020"], Vec::<String>::new())),
            MemoryLedger::new(ServiceKind::Radarr),
            TransferOutcome::failed("connection refused"),
            &metrics,
        );
        let notifier = Arc::new(RecordingNotifier::new());

        let summary = RunCycle::new(vec![radarr.pipeline], Some(notifier.clone()))
            .run()
            .await;

        let notification = summary.notification.ok_or("notification missing")?;
        assert_eq!(notification.severity, Severity::Error);
        assert!(notification.message.contains("connection refused"));
        assert!(radarr.ledger.entry("Movie.2020").ok_or("row missing")?.notified);
        assert_eq!(metrics.snapshot("radarr").transfer_failures, 1);
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_queue_leaves_ledger_untouched() -> TestResult {
        let metrics = Metrics::new()?;
        let sonarr = fixture(
            ServiceKind::Sonarr,
            StaticQueue::unavailable(),
            StaticLister::new(RemoteListing::default()),
            MemoryLedger::with_rows(ServiceKind::Sonarr, [ledger_entry("In.Progress", 1)]),
            TransferOutcome::succeeded(""),
            &metrics,
        );

        let outcome = sonarr.pipeline.run().await;

        assert!(outcome.report.is_none());
        assert!(sonarr.lister.roots().is_empty());
        assert!(sonarr.copier.calls().is_empty());
        let row = sonarr.ledger.entry("In.Progress").ok_or("row missing")?;
        assert!(!row.import_complete);
        assert_eq!(metrics.snapshot("sonarr").source_unavailable, 1);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_remote_leaves_ledger_untouched() -> TestResult {
        let metrics = Metrics::new()?;
        let radarr = fixture(
            ServiceKind::Radarr,
            StaticQueue::records(vec![pending_record("/data/radarr/Movie.2020")]),
            StaticLister::unavailable(),
            MemoryLedger::with_rows(ServiceKind::Radarr, [ledger_entry("Earlier.Movie", 2)]),
            TransferOutcome::succeeded(""),
            &metrics,
        );

        let outcome = radarr.pipeline.run().await;

        assert_eq!(outcome, ServiceOutcome::unavailable(ServiceKind::Radarr));
        assert!(radarr.ledger.entry("Movie.2020").is_none());
        assert!(
            !radarr
                .ledger
                .entry("Earlier.Movie")
                .ok_or("row missing")?
                .import_complete
        );
        Ok(())
    }

    #[tokio::test]
    async fn services_run_independently() -> TestResult {
        let metrics = Metrics::new()?;
        let sonarr = fixture(
            ServiceKind::Sonarr,
            StaticQueue::unavailable(),
            StaticLister::new(RemoteListing::default()),
            MemoryLedger::new(ServiceKind::Sonarr),
            TransferOutcome::succeeded(""),
            &metrics,
        );
        let radarr = fixture(
            ServiceKind::Radarr,
            StaticQueue::records(vec![pending_record("/data/radarr/Movie.mkv")]),
            StaticLister::new(RemoteListing::new(Vec::<String>::new(), ["Movie.mkv"])),
            MemoryLedger::new(ServiceKind::Radarr),
            TransferOutcome::succeeded(""),
            &metrics,
        );
        let notifier = Arc::new(RecordingNotifier::new());

        let summary = RunCycle::new(vec![sonarr.pipeline, radarr.pipeline], Some(notifier.clone()))
            .run()
            .await;

        assert_eq!(summary.outcomes.len(), 2);
        assert!(sonarr.copier.calls().is_empty());
        assert_eq!(
            radarr.copier.calls()[0],
            (
                vec!["/seed/radarr/Movie.mkv".to_string()],
                std::path::PathBuf::from("/nonexistent/arrsync/radarr")
            )
        );
        assert!(sonarr.ledger.entry("Movie.mkv").is_none());
        assert_eq!(notifier.sent().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_not_raised() -> TestResult {
        let metrics = Metrics::new()?;
        let radarr = fixture(
            ServiceKind::Radarr,
            StaticQueue::records(vec![pending_record("/data/radarr/Movie.mkv")]),
            StaticLister::new(RemoteListing::new(Vec::<String>::new(), ["Movie.mkv"])),
            MemoryLedger::new(ServiceKind::Radarr),
            TransferOutcome::succeeded(""),
            &metrics,
        );

        let summary = RunCycle::new(
            vec![radarr.pipeline],
            Some(Arc::new(RecordingNotifier::failing())),
        )
        .run()
        .await;

        assert!(summary.notification.is_some());
        assert!(!summary.delivered);
        Ok(())
    }
}
