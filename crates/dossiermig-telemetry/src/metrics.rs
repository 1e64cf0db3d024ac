//! Prometheus-backed run metrics.
//!
//! # Design
//! - Collector registration stays private; callers only see typed increments.
//! - The registry is not exported over HTTP; the rendered text is logged at the end of a run.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Terminal or intermediate outcome of one upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The destination accepted the upload.
    Fulfilled,
    /// The attempt failed and the request was requeued.
    Retried,
    /// The request failed its last allowed attempt.
    Abandoned,
}

impl UploadOutcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Fulfilled => "fulfilled",
            Self::Retried => "retried",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Counters for one migration run.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    items_seen_total: IntCounter,
    items_skipped_total: IntCounterVec,
    items_skipped_any: AtomicU64,
    uploads_total: IntCounterVec,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Descriptors handed to the pipeline.
    pub items_seen: u64,
    /// Items skipped for any reason.
    pub items_skipped: u64,
    /// Uploads accepted by the destination.
    pub uploads_fulfilled: u64,
    /// Failed attempts that were requeued.
    pub uploads_retried: u64,
    /// Uploads given up after the last attempt.
    pub uploads_abandoned: u64,
}

impl Metrics {
    /// Construct a registry with the run collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any collector cannot be registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let items_seen_total = IntCounter::with_opts(Opts::new(
            "migration_items_seen_total",
            "Descriptors handed to the mutator pipeline",
        ))?;
        let items_skipped_total = IntCounterVec::new(
            Opts::new("migration_items_skipped_total", "Items skipped by reason"),
            &["reason"],
        )?;
        let uploads_total = IntCounterVec::new(
            Opts::new("migration_uploads_total", "Upload attempts by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(items_seen_total.clone()))?;
        registry.register(Box::new(items_skipped_total.clone()))?;
        registry.register(Box::new(uploads_total.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                items_seen_total,
                items_skipped_total,
                items_skipped_any: AtomicU64::new(0),
                uploads_total,
            }),
        })
    }

    /// Count a descriptor entering the pipeline.
    pub fn inc_item_seen(&self) {
        self.inner.items_seen_total.inc();
    }

    /// Count a skipped item.
    pub fn inc_item_skipped(&self, reason: &str) {
        self.inner
            .items_skipped_total
            .with_label_values(&[reason])
            .inc();
        self.inner.items_skipped_any.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an upload outcome.
    pub fn inc_upload(&self, outcome: UploadOutcome) {
        self.inner
            .uploads_total
            .with_label_values(&[outcome.label()])
            .inc();
    }

    /// Skips recorded for one reason.
    #[must_use]
    pub fn skipped_for(&self, reason: &str) -> u64 {
        self.inner
            .items_skipped_total
            .with_label_values(&[reason])
            .get()
    }

    /// Copy the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let upload = |outcome: UploadOutcome| {
            self.inner
                .uploads_total
                .with_label_values(&[outcome.label()])
                .get()
        };
        MetricsSnapshot {
            items_seen: self.inner.items_seen_total.get(),
            items_skipped: self.inner.items_skipped_any.load(Ordering::Relaxed),
            uploads_fulfilled: upload(UploadOutcome::Fulfilled),
            uploads_retried: upload(UploadOutcome::Retried),
            uploads_abandoned: upload(UploadOutcome::Abandoned),
        }
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the output is not UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_item_seen();
        metrics.inc_item_seen();
        metrics.inc_item_skipped("deny_list");
        metrics.inc_item_skipped("customer_not_found");
        metrics.inc_item_skipped("deny_list");
        metrics.inc_upload(UploadOutcome::Fulfilled);
        metrics.inc_upload(UploadOutcome::Retried);
        metrics.inc_upload(UploadOutcome::Abandoned);

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot,
            MetricsSnapshot {
                items_seen: 2,
                items_skipped: 3,
                uploads_fulfilled: 1,
                uploads_retried: 1,
                uploads_abandoned: 1,
            }
        );
        assert_eq!(metrics.skipped_for("deny_list"), 2);

        let rendered = metrics.render()?;
        assert!(rendered.contains("migration_items_seen_total 2"));
        assert!(rendered.contains("reason=\"deny_list\""));
        Ok(())
    }

    #[test]
    fn clones_share_counters() -> Result<()> {
        let metrics = Metrics::new()?;
        let clone = metrics.clone();
        clone.inc_upload(UploadOutcome::Fulfilled);
        assert_eq!(metrics.snapshot().uploads_fulfilled, 1);
        Ok(())
    }
}
