//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring ledger writes.
//!
//! # Metrics
//!
//! - `ledger_expenses_total` - Expenses committed
//! - `ledger_payments_total` - Payments committed
//! - `ledger_duplicate_submissions_total` - Idempotent submissions collapsed
//! - `ledger_write_duration_seconds` - Histogram of write latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Expenses committed
    pub expenses_total: IntCounter,

    /// Payments committed
    pub payments_total: IntCounter,

    /// Duplicate idempotent submissions collapsed
    pub duplicate_submissions_total: IntCounter,

    /// Write latency histogram
    pub write_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with an owned registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let expenses_total =
            IntCounter::new("ledger_expenses_total", "Expenses committed")?;
        registry.register(Box::new(expenses_total.clone()))?;

        let payments_total =
            IntCounter::new("ledger_payments_total", "Payments committed")?;
        registry.register(Box::new(payments_total.clone()))?;

        let duplicate_submissions_total = IntCounter::new(
            "ledger_duplicate_submissions_total",
            "Idempotent submissions collapsed to an existing record",
        )?;
        registry.register(Box::new(duplicate_submissions_total.clone()))?;

        let write_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_write_duration_seconds",
                "Histogram of write latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500]),
        )?;
        registry.register(Box::new(write_duration.clone()))?;

        Ok(Self {
            expenses_total,
            payments_total,
            duplicate_submissions_total,
            write_duration,
            registry,
        })
    }

    /// Record an expense commit
    pub fn record_expense(&self) {
        self.expenses_total.inc();
    }

    /// Record a payment commit
    pub fn record_payment(&self) {
        self.payments_total.inc();
    }

    /// Record a collapsed duplicate submission
    pub fn record_duplicate(&self) {
        self.duplicate_submissions_total.inc();
    }

    /// Record write duration
    pub fn record_write_duration(&self, duration_seconds: f64) {
        self.write_duration.observe(duration_seconds);
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
