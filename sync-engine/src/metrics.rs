//! Metrics collection for sync observability
//!
//! # Metrics
//!
//! - `sync_entries_synced_total` - Entries acknowledged by the remote store
//! - `sync_retries_total` - Submission retries performed
//! - `sync_conflicts_total` - Entries parked on server conflict
//! - `sync_permanent_failures_total` - Entries retired after exhausting retries
//! - `sync_drain_duration_seconds` - Histogram of drain pass durations

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Entries acknowledged and removed from the queue
    pub entries_synced_total: IntCounter,

    /// Submission retries performed
    pub retries_total: IntCounter,

    /// Entries parked on server conflict
    pub conflicts_total: IntCounter,

    /// Entries retired after exhausting retries
    pub permanent_failures_total: IntCounter,

    /// Drain pass duration histogram
    pub drain_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with an owned registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let entries_synced_total = IntCounter::new(
            "sync_entries_synced_total",
            "Entries acknowledged by the remote store",
        )?;
        registry.register(Box::new(entries_synced_total.clone()))?;

        let retries_total =
            IntCounter::new("sync_retries_total", "Submission retries performed")?;
        registry.register(Box::new(retries_total.clone()))?;

        let conflicts_total =
            IntCounter::new("sync_conflicts_total", "Entries parked on server conflict")?;
        registry.register(Box::new(conflicts_total.clone()))?;

        let permanent_failures_total = IntCounter::new(
            "sync_permanent_failures_total",
            "Entries retired after exhausting retries",
        )?;
        registry.register(Box::new(permanent_failures_total.clone()))?;

        let drain_duration = Histogram::with_opts(
            HistogramOpts::new(
                "sync_drain_duration_seconds",
                "Histogram of drain pass durations",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0]),
        )?;
        registry.register(Box::new(drain_duration.clone()))?;

        Ok(Self {
            entries_synced_total,
            retries_total,
            conflicts_total,
            permanent_failures_total,
            drain_duration,
            registry,
        })
    }

    /// Record a synced entry
    pub fn record_synced(&self) {
        self.entries_synced_total.inc();
    }

    /// Record a retry
    pub fn record_retry(&self) {
        self.retries_total.inc();
    }

    /// Record a conflict
    pub fn record_conflict(&self) {
        self.conflicts_total.inc();
    }

    /// Record a permanent failure
    pub fn record_permanent_failure(&self) {
        self.permanent_failures_total.inc();
    }

    /// Record drain pass duration
    pub fn record_drain_duration(&self, duration_seconds: f64) {
        self.drain_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.entries_synced_total.get(), 0);
        assert_eq!(metrics.retries_total.get(), 0);
    }

    #[test]
    fn test_record_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_synced();
        metrics.record_retry();
        metrics.record_retry();
        metrics.record_conflict();
        metrics.record_permanent_failure();

        assert_eq!(metrics.entries_synced_total.get(), 1);
        assert_eq!(metrics.retries_total.get(), 2);
        assert_eq!(metrics.conflicts_total.get(), 1);
        assert_eq!(metrics.permanent_failures_total.get(), 1);
    }
}
