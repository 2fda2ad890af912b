//! Reconciliation engine: the per-item transfer lifecycle.
//!
//! # Design
//! - `decide` is the whole decision table; everything else applies its result.
//! - Ledger failures abort only the candidate being processed.
//! - Completion and purge run after every candidate has been decided.

use std::collections::BTreeSet;

use tracing::{debug, error, info, warn};

use crate::collaborators::Ledger;
use crate::error::SyncResult;
use crate::model::{CandidateItem, Decision, LedgerEntry, ServiceContext};
use crate::purge::{PurgeOutcome, purge_local};

/// Decide what to do with a candidate given its ledger row.
#[must_use]
pub fn decide(entry: Option<&LedgerEntry>, ceiling: u32) -> Decision {
    match entry {
        None => Decision::Track,
        Some(entry) if entry.retries < ceiling && !entry.import_complete => Decision::Retry,
        Some(entry) if entry.retries == ceiling && !entry.notified && !entry.import_complete => {
            Decision::GiveUp
        }
        Some(_) => Decision::Skip,
    }
}

/// Everything one reconciliation pass decided and did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Candidates that need a transfer, with `full_path` set.
    pub transfers: Vec<CandidateItem>,
    /// Candidates that reached the retry ceiling.
    pub give_ups: Vec<CandidateItem>,
    /// Candidates left alone this run.
    pub skipped: Vec<CandidateItem>,
    /// Candidates whose ledger call failed.
    pub errored: Vec<String>,
    /// Rows marked complete.
    pub completed: u64,
    /// Ledger keys whose local copy was deleted.
    pub purged: Vec<String>,
    /// Ledger keys whose local copy could not be deleted.
    pub purge_failures: Vec<String>,
}

/// Applies the decision table for one service against its ledger.
pub struct ReconciliationEngine<'a> {
    context: &'a ServiceContext,
    ledger: &'a dyn Ledger,
}

impl<'a> ReconciliationEngine<'a> {
    /// Bind the engine to a service context and that service's ledger.
    #[must_use]
    pub const fn new(context: &'a ServiceContext, ledger: &'a dyn Ledger) -> Self {
        Self { context, ledger }
    }

    /// Decide every candidate, then complete vanished rows and purge their local copies.
    pub async fn reconcile(&self, candidates: Vec<CandidateItem>) -> ReconcileReport {
        let service = self.context.service;
        let mut report = ReconcileReport::default();
        let present: BTreeSet<String> = candidates
            .iter()
            .map(|candidate| candidate.relative_path.clone())
            .collect();

        for candidate in candidates {
            let path = candidate.relative_path.clone();
            match self.process(candidate).await {
                Ok((Decision::Track | Decision::Retry, item)) => report.transfers.push(item),
                Ok((Decision::GiveUp, item)) => report.give_ups.push(item),
                Ok((Decision::Skip, item)) => report.skipped.push(item),
                Err(err) => {
                    warn!(
                        service = %service,
                        path = %path,
                        error = %err,
                        detail = ?err,
                        "ledger update failed; candidate left for the next run"
                    );
                    report.errored.push(path);
                }
            }
        }

        self.complete_missing(&present, &mut report).await;
        self.purge_completed(&mut report).await;
        report
    }

    async fn process(&self, mut candidate: CandidateItem) -> SyncResult<(Decision, CandidateItem)> {
        let service = self.context.service;
        let entry = self.ledger.lookup(&candidate.relative_path).await?;
        let decision = decide(entry.as_ref(), self.context.retry_ceiling);
        let notified = entry.as_ref().is_some_and(|entry| entry.notified);

        match decision {
            Decision::Track => {
                self.ledger.ensure_tracked(&candidate.relative_path).await?;
                candidate.notified = false;
                info!(service = %service, path = %candidate.relative_path, "tracking new item");
            }
            Decision::Retry => {
                self.ledger.increment_retry(&candidate.relative_path).await?;
                candidate.notified = notified;
                info!(
                    service = %service,
                    path = %candidate.relative_path,
                    attempt = entry.as_ref().map_or(0, |entry| entry.retries + 1),
                    "retrying transfer"
                );
            }
            Decision::GiveUp => {
                candidate.notified = notified;
                error!(
                    service = %service,
                    path = %candidate.relative_path,
                    retries = self.context.retry_ceiling,
                    "item was transferred the maximum number of times without being imported; manual intervention required"
                );
            }
            Decision::Skip => {
                candidate.notified = notified;
                debug!(service = %service, path = %candidate.relative_path, "nothing to do");
            }
        }

        if matches!(decision, Decision::Track | Decision::Retry) {
            candidate.full_path = Some(self.context.remote_path(&candidate.relative_path));
        }
        Ok((decision, candidate))
    }

    async fn complete_missing(&self, present: &BTreeSet<String>, report: &mut ReconcileReport) {
        let service = self.context.service;
        match self.ledger.mark_complete_missing(present).await {
            Ok(count) => {
                report.completed = count;
                if count > 0 {
                    info!(service = %service, count, "marked vanished items as imported");
                }
            }
            Err(err) => {
                error!(
                    service = %service,
                    error = %err,
                    detail = ?err,
                    "failed to mark vanished items as imported"
                );
            }
        }
    }

    async fn purge_completed(&self, report: &mut ReconcileReport) {
        let service = self.context.service;
        let entries = match self.ledger.select_purgeable().await {
            Ok(entries) => entries,
            Err(err) => {
                error!(
                    service = %service,
                    error = %err,
                    detail = ?err,
                    "failed to list purgeable items"
                );
                return;
            }
        };

        for entry in entries {
            let name = entry.torrent_name;
            let Some(local) = self.context.local_path(&name) else {
                warn!(
                    service = %service,
                    path = %name,
                    "ledger key escapes the destination; not purging"
                );
                report.purge_failures.push(name);
                continue;
            };
            match purge_local(&local) {
                PurgeOutcome::Removed => {
                    info!(service = %service, path = %local.display(), "purged imported item");
                    report.purged.push(name);
                }
                PurgeOutcome::Symlink => {
                    warn!(
                        service = %service,
                        path = %local.display(),
                        "refusing to delete symbolic link; row stays unpurged"
                    );
                    report.purge_failures.push(name);
                }
                PurgeOutcome::Missing => {
                    warn!(
                        service = %service,
                        path = %local.display(),
                        "imported item is missing locally; row stays unpurged"
                    );
                    report.purge_failures.push(name);
                }
                PurgeOutcome::Failed(err) => {
                    error!(
                        service = %service,
                        path = %local.display(),
                        error = %err,
                        "failed to delete imported item"
                    );
                    report.purge_failures.push(name);
                }
            }
        }

        if report.purged.is_empty() {
            return;
        }
        if let Err(err) = self.ledger.mark_purged(&report.purged).await {
            error!(
                service = %service,
                error = %err,
                detail = ?err,
                "deleted items could not be marked purged"
            );
        }
    }
}
