//! Prometheus-backed run metrics and textfile export.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Counters are labelled by service so both pipelines share one registry.
//! - Batch runs have no scrape endpoint; the exposition is written to a textfile instead.

use std::path::Path;
use std::sync::Arc;

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across both service pipelines.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    items_transferred_total: IntCounterVec,
    transfer_failures_total: IntCounterVec,
    give_ups_total: IntCounterVec,
    items_completed_total: IntCounterVec,
    items_purged_total: IntCounterVec,
    purge_failures_total: IntCounterVec,
    source_unavailable_total: IntCounterVec,
    last_run_timestamp_seconds: IntGauge,
}

/// Snapshot of per-service counters, used by tests and run summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Items handed to the bulk copier.
    pub items_transferred: u64,
    /// Bulk copy invocations that reported failure.
    pub transfer_failures: u64,
    /// Items that reached the retry ceiling.
    pub give_ups: u64,
    /// Ledger rows marked complete.
    pub items_completed: u64,
    /// Local paths deleted and marked purged.
    pub items_purged: u64,
    /// Local paths that could not be deleted.
    pub purge_failures: u64,
    /// Runs where the queue or remote listing was unavailable.
    pub source_unavailable: u64,
}

fn counter(registry: &Registry, name: &'static str, help: &str) -> Result<IntCounterVec> {
    let collector = IntCounterVec::new(Opts::new(name, help), &["service"])
        .map_err(|source| TelemetryError::MetricsCollector { name, source })?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(collector)
}

impl Metrics {
    /// Construct a new metrics registry with the run collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let items_transferred_total = counter(
            &registry,
            "arrsync_items_transferred_total",
            "Items handed to the bulk copier",
        )?;
        let transfer_failures_total = counter(
            &registry,
            "arrsync_transfer_failures_total",
            "Bulk copy invocations that failed",
        )?;
        let give_ups_total = counter(
            &registry,
            "arrsync_give_ups_total",
            "Items that reached the retry ceiling and need manual intervention",
        )?;
        let items_completed_total = counter(
            &registry,
            "arrsync_items_completed_total",
            "Ledger rows marked import-complete",
        )?;
        let items_purged_total = counter(
            &registry,
            "arrsync_items_purged_total",
            "Local paths deleted after import completion",
        )?;
        let purge_failures_total = counter(
            &registry,
            "arrsync_purge_failures_total",
            "Local paths that could not be deleted",
        )?;
        let source_unavailable_total = counter(
            &registry,
            "arrsync_source_unavailable_total",
            "Runs where the queue API or remote listing was unavailable",
        )?;

        let gauge_name = "arrsync_last_run_timestamp_seconds";
        let last_run_timestamp_seconds = IntGauge::with_opts(Opts::new(
            gauge_name,
            "Unix timestamp of the last completed run",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: gauge_name,
            source,
        })?;
        registry
            .register(Box::new(last_run_timestamp_seconds.clone()))
            .map_err(|source| TelemetryError::MetricsRegister {
                name: gauge_name,
                source,
            })?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                items_transferred_total,
                transfer_failures_total,
                give_ups_total,
                items_completed_total,
                items_purged_total,
                purge_failures_total,
                source_unavailable_total,
                last_run_timestamp_seconds,
            }),
        })
    }

    /// Count items handed to the bulk copier.
    pub fn add_transferred(&self, service: &str, count: u64) {
        self.inner
            .items_transferred_total
            .with_label_values(&[service])
            .inc_by(count);
    }

    /// Count a failed bulk copy invocation.
    pub fn inc_transfer_failure(&self, service: &str) {
        self.inner
            .transfer_failures_total
            .with_label_values(&[service])
            .inc();
    }

    /// Count items that reached the retry ceiling.
    pub fn add_give_ups(&self, service: &str, count: u64) {
        self.inner
            .give_ups_total
            .with_label_values(&[service])
            .inc_by(count);
    }

    /// Count ledger rows marked complete.
    pub fn add_completed(&self, service: &str, count: u64) {
        self.inner
            .items_completed_total
            .with_label_values(&[service])
            .inc_by(count);
    }

    /// Count deleted local paths.
    pub fn add_purged(&self, service: &str, count: u64) {
        self.inner
            .items_purged_total
            .with_label_values(&[service])
            .inc_by(count);
    }

    /// Count local paths that could not be deleted.
    pub fn add_purge_failures(&self, service: &str, count: u64) {
        self.inner
            .purge_failures_total
            .with_label_values(&[service])
            .inc_by(count);
    }

    /// Count an unavailable queue or remote listing.
    pub fn inc_source_unavailable(&self, service: &str) {
        self.inner
            .source_unavailable_total
            .with_label_values(&[service])
            .inc();
    }

    /// Record the completion time of the current run.
    pub fn set_last_run(&self, unix_seconds: i64) {
        self.inner.last_run_timestamp_seconds.set(unix_seconds);
    }

    /// Read back the counters recorded for one service.
    #[must_use]
    pub fn snapshot(&self, service: &str) -> MetricsSnapshot {
        let read = |vec: &IntCounterVec| vec.with_label_values(&[service]).get();
        MetricsSnapshot {
            items_transferred: read(&self.inner.items_transferred_total),
            transfer_failures: read(&self.inner.transfer_failures_total),
            give_ups: read(&self.inner.give_ups_total),
            items_completed: read(&self.inner.items_completed_total),
            items_purged: read(&self.inner.items_purged_total),
            purge_failures: read(&self.inner.purge_failures_total),
            source_unavailable: read(&self.inner.source_unavailable_total),
        }
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Write the rendered exposition to `path`, replacing it atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails or the file cannot be written.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let rendered = self.render()?;
        let staging = path.with_extension("prom.tmp");
        let write_err = |source| TelemetryError::MetricsWrite {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(&staging, rendered.as_bytes()).map_err(write_err)?;
        std::fs::rename(&staging, path).map_err(write_err)
    }
}
