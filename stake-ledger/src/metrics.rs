//! Metrics collection for observability
//!
//! Prometheus metrics owned by a per-ledger `Registry`, so several ledgers
//! (one per test, for instance) can live in the same process.
//!
//! # Metrics
//!
//! - `stake_ledger_mutations_total{operation, outcome}` - Wallet mutations processed by the writer
//! - `stake_ledger_mutation_duration_seconds{operation}` - Writer-side mutation latency
//! - `stake_ledger_activity_events_total` - Activity events persisted
//! - `stake_ledger_activity_write_failures_total` - Activity events lost to a failed write
//! - `stake_ledger_activity_batch_size` - Histogram of flushed batch sizes
//! - `stake_ledger_admin_rejections_total{reason}` - Rejected reward-rate updates

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Mutations by operation and outcome
    pub mutations_total: IntCounterVec,

    /// Mutation latency by operation
    pub mutation_duration: HistogramVec,

    /// Activity events persisted
    pub activity_events_total: IntCounter,

    /// Activity events that could not be written
    pub activity_write_failures: IntCounter,

    /// Flushed batch sizes
    pub batch_size: Histogram,

    /// Rejected admin updates by reason
    pub admin_rejections: IntCounterVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("activity_events_total", &self.activity_events_total.get())
            .field("activity_write_failures", &self.activity_write_failures.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let mutations_total = IntCounterVec::new(
            Opts::new(
                "stake_ledger_mutations_total",
                "Wallet mutations processed by the writer",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(mutations_total.clone()))?;

        let mutation_duration = HistogramVec::new(
            HistogramOpts::new(
                "stake_ledger_mutation_duration_seconds",
                "Writer-side mutation latency",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(mutation_duration.clone()))?;

        let activity_events_total = IntCounter::new(
            "stake_ledger_activity_events_total",
            "Activity events persisted",
        )?;
        registry.register(Box::new(activity_events_total.clone()))?;

        let activity_write_failures = IntCounter::new(
            "stake_ledger_activity_write_failures_total",
            "Activity events lost to a failed write",
        )?;
        registry.register(Box::new(activity_write_failures.clone()))?;

        let batch_size = Histogram::with_opts(
            HistogramOpts::new(
                "stake_ledger_activity_batch_size",
                "Histogram of flushed activity batch sizes",
            )
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]),
        )?;
        registry.register(Box::new(batch_size.clone()))?;

        let admin_rejections = IntCounterVec::new(
            Opts::new(
                "stake_ledger_admin_rejections_total",
                "Rejected reward-rate updates",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(admin_rejections.clone()))?;

        Ok(Self {
            mutations_total,
            mutation_duration,
            activity_events_total,
            activity_write_failures,
            batch_size,
            admin_rejections,
            registry,
        })
    }

    /// Record a finished mutation
    pub fn record_mutation(&self, operation: &str, ok: bool, duration_seconds: f64) {
        let outcome = if ok { "ok" } else { "error" };
        self.mutations_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.mutation_duration
            .with_label_values(&[operation])
            .observe(duration_seconds);
    }

    /// Record persisted activity events
    pub fn record_activity_written(&self, count: usize) {
        self.activity_events_total.inc_by(count as u64);
    }

    /// Record activity events lost to a failed write
    pub fn record_activity_failure(&self, count: usize) {
        self.activity_write_failures.inc_by(count as u64);
    }

    /// Record batch flush
    pub fn record_batch_flush(&self, batch_size: usize) {
        self.batch_size.observe(batch_size as f64);
    }

    /// Record a rejected admin update
    pub fn record_admin_rejection(&self, reason: &str) {
        self.admin_rejections.with_label_values(&[reason]).inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render in the Prometheus text exposition format
    pub fn encode(&self) -> crate::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| crate::Error::Other(format!("Failed to encode metrics: {}", e)))?;
        String::from_utf8(buffer)
            .map_err(|e| crate::Error::Other(format!("Metrics are not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.activity_events_total.get(), 0);
        assert_eq!(metrics.activity_write_failures.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();

        first.record_activity_written(3);
        assert_eq!(first.activity_events_total.get(), 3);
        assert_eq!(second.activity_events_total.get(), 0);
    }

    #[test]
    fn test_record_mutation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_mutation("stake", true, 0.002);
        metrics.record_mutation("stake", true, 0.001);
        metrics.record_mutation("stake", false, 0.001);

        assert_eq!(
            metrics
                .mutations_total
                .with_label_values(&["stake", "ok"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .mutations_total
                .with_label_values(&["stake", "error"])
                .get(),
            1
        );
    }

    #[test]
    fn test_encode_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.record_admin_rejection("unauthorized");
        metrics.record_batch_flush(10);

        let text = metrics.encode().unwrap();
        assert!(text.contains("stake_ledger_admin_rejections_total{reason=\"unauthorized\"} 1"));
        assert!(text.contains("stake_ledger_activity_batch_size"));
    }
}
