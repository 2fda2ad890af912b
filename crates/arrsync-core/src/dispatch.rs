//! Transfer dispatch and run notification.
//!
//! # Design
//! - One copier invocation per service per run; its outcome is all-or-nothing.
//! - Items are flagged notified after the copy whether or not it succeeded.
//! - At most one message per run, covering both services.

use std::fmt::Write as _;

use tracing::{error, info, warn};

use crate::collaborators::{BulkCopier, Ledger, Notifier};
use crate::engine::ReconcileReport;
use crate::model::{CandidateItem, ServiceContext, ServiceKind, Severity, TransferOutcome};

/// Message and severity for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Combined text for every service.
    pub message: String,
    /// `Error` when any transfer failed.
    pub severity: Severity,
}

/// What one service pipeline produced this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOutcome {
    /// Service the outcome belongs to.
    pub service: ServiceKind,
    /// Engine report; `None` when the sources were unavailable.
    pub report: Option<ReconcileReport>,
    /// Copier result; `None` when nothing needed a transfer.
    pub transfer: Option<TransferOutcome>,
    /// Transferred items that had not been notified before this run.
    pub announced: Vec<CandidateItem>,
}

impl ServiceOutcome {
    /// Outcome for a run whose sources could not be read.
    #[must_use]
    pub const fn unavailable(service: ServiceKind) -> Self {
        Self {
            service,
            report: None,
            transfer: None,
            announced: Vec::new(),
        }
    }
}

/// Hand every transfer to the copier in one invocation.
///
/// Returns `None` without calling the copier when there is nothing to send.
pub async fn dispatch_transfers(
    context: &ServiceContext,
    copier: &dyn BulkCopier,
    transfers: &[CandidateItem],
) -> Option<TransferOutcome> {
    let service = context.service;
    let sources: Vec<String> = transfers
        .iter()
        .filter_map(|item| item.full_path.clone())
        .collect();
    if sources.is_empty() {
        info!(service = %service, "no torrents to transfer");
        return None;
    }

    info!(service = %service, count = sources.len(), "starting bulk transfer");
    let outcome = copier.copy(&sources, &context.destination).await;
    if outcome.success {
        info!(service = %service, count = sources.len(), "bulk transfer finished");
    } else {
        error!(
            service = %service,
            diagnostic = %outcome.diagnostic,
            "bulk transfer failed"
        );
    }
    Some(outcome)
}

/// Flag every not-yet-notified transfer in the ledger and return those items.
pub async fn record_notified(
    ledger: &dyn Ledger,
    transfers: &[CandidateItem],
) -> Vec<CandidateItem> {
    let mut announced = Vec::new();
    for item in transfers.iter().filter(|item| !item.notified) {
        if let Err(err) = ledger.set_notified(&item.relative_path).await {
            warn!(
                service = %ledger.service(),
                path = %item.relative_path,
                error = %err,
                detail = ?err,
                "failed to record notification"
            );
        }
        announced.push(CandidateItem {
            notified: true,
            ..item.clone()
        });
    }
    announced
}

/// Build the combined run message, or `None` when nothing new was transferred.
#[must_use]
pub fn compose_message(outcomes: &[ServiceOutcome]) -> Option<Notification> {
    let mut message = String::new();
    let mut severity = Severity::Message;

    for outcome in outcomes {
        let Some(transfer) = outcome.transfer.as_ref() else {
            continue;
        };
        if outcome.announced.is_empty() {
            continue;
        }
        let label = outcome.service.label();
        if transfer.success {
            let _ = writeln!(
                message,
                "Transferred {} new {label} torrents:",
                outcome.announced.len()
            );
            for item in &outcome.announced {
                let _ = writeln!(message, "{}", item.basename());
            }
        } else {
            severity = Severity::Error;
            let _ = writeln!(
                message,
                "Transfer failed for {label} torrents with error message: {}",
                transfer.diagnostic
            );
        }
    }

    (!message.is_empty()).then_some(Notification { message, severity })
}

/// Send the run notification; returns whether it was delivered.
pub async fn deliver(notifier: Option<&dyn Notifier>, notification: &Notification) -> bool {
    let Some(notifier) = notifier else {
        info!("notifications disabled; skipping delivery");
        return false;
    };
    match notifier
        .notify(&notification.message, notification.severity)
        .await
    {
        Ok(()) => {
            info!(severity = notification.severity.as_str(), "notification sent");
            true
        }
        Err(err) => {
            error!(error = %err, detail = ?err, "notification delivery failed");
            false
        }
    }
}
