//! Shared application state

use leafscan_inference::InferencePipeline;
use leafscan_telemetry::{DetectionStore, MetricsCollector};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// State handed to every request handler
#[derive(Clone)]
pub struct AppState {
    /// Diagnosis pipeline, built once at startup
    pub pipeline: Arc<InferencePipeline>,

    /// Detection history
    pub store: Arc<dyn DetectionStore>,

    pub metrics: MetricsCollector,

    /// Renders `/metrics`; absent when no recorder is installed
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(pipeline: InferencePipeline, store: Arc<dyn DetectionStore>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            store,
            metrics: MetricsCollector::new(),
            prometheus: None,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}
