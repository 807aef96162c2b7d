//! Metrics collection and reporting
//!
//! Every recording goes both to the global `metrics` recorder (exported as
//! Prometheus text by the server) and to in-process counters that back
//! [`MetricsSnapshot`].

use leafscan_core::Severity;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const PREDICTIONS_TOTAL: &str = "leafscan_predictions_total";
pub const PREDICTION_LATENCY_US: &str = "leafscan_prediction_latency_us";
pub const ERRORS_TOTAL: &str = "leafscan_errors_total";
pub const DETECTIONS_STORED_TOTAL: &str = "leafscan_detections_stored_total";

/// Register descriptions with the installed recorder
pub fn describe_metrics() {
    describe_counter!(PREDICTIONS_TOTAL, "Predictions served, by severity and mode");
    describe_histogram!(
        PREDICTION_LATENCY_US,
        Unit::Microseconds,
        "Prediction latency in microseconds"
    );
    describe_counter!(ERRORS_TOTAL, "Failed requests, by error kind");
    describe_counter!(DETECTIONS_STORED_TOTAL, "Detection records persisted");
}

/// Metrics collector for LeafScan request handling
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    predictions: AtomicU64,
    high_severity: AtomicU64,
    errors: AtomicU64,
    stored: AtomicU64,
    total_latency_us: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a served prediction
    pub fn record_prediction(&self, severity: Severity, mode: &'static str, latency_us: u64) {
        self.inner.predictions.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
        if severity == Severity::High {
            self.inner.high_severity.fetch_add(1, Ordering::Relaxed);
        }

        counter!(PREDICTIONS_TOTAL, "severity" => severity.as_str(), "mode" => mode).increment(1);
        histogram!(PREDICTION_LATENCY_US).record(latency_us as f64);
    }

    /// Record a failed request
    pub fn record_error(&self, kind: &'static str) {
        self.inner.errors.fetch_add(1, Ordering::Relaxed);
        counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
    }

    /// Record a persisted detection
    pub fn record_stored(&self) {
        self.inner.stored.fetch_add(1, Ordering::Relaxed);
        counter!(DETECTIONS_STORED_TOTAL).increment(1);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            predictions: self.inner.predictions.load(Ordering::Relaxed),
            high_severity: self.inner.high_severity.load(Ordering::Relaxed),
            errors: self.inner.errors.load(Ordering::Relaxed),
            stored: self.inner.stored.load(Ordering::Relaxed),
            total_latency_us: self.inner.total_latency_us.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub predictions: u64,
    pub high_severity: u64,
    pub errors: u64,
    pub stored: u64,
    pub total_latency_us: u64,
}

impl MetricsSnapshot {
    /// Average latency per prediction
    pub fn avg_latency_us(&self) -> u64 {
        if self.predictions == 0 {
            0
        } else {
            self.total_latency_us / self.predictions
        }
    }

    /// Share of predictions rated high severity
    pub fn high_severity_rate(&self) -> f64 {
        if self.predictions == 0 {
            0.0
        } else {
            self.high_severity as f64 / self.predictions as f64
        }
    }
}
