//! LeafScan Telemetry
//!
//! Detection history and metrics for LeafScan.
//!
//! Provides:
//! - Detection records with optional geolocation
//! - History stores (in-memory and append-only JSON lines)
//! - Prediction metrics exported through the `metrics` facade

pub mod metrics;
pub mod persistence;
pub mod records;
pub mod store;

pub use crate::metrics::{describe_metrics, MetricsCollector, MetricsSnapshot};
pub use crate::persistence::{JsonlStore, PersistenceConfig};
pub use crate::records::{check_coordinates, image_digest, CoordinateError, DetectionRecord, HistoryQuery};
pub use crate::store::{DetectionStore, MemoryStore, StorageConfig};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::metrics::MetricsCollector;
    pub use crate::records::{DetectionRecord, HistoryQuery};
    pub use crate::store::{DetectionStore, StorageConfig};
}
