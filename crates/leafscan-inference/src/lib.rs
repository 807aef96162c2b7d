//! LeafScan Inference
//!
//! Turns a plant-leaf photo into a diagnosis: disease label, confidence,
//! severity tier and treatment steps.
//!
//! The pipeline runs in a fixed order:
//! - Preprocessing: decode, RGB, bilinear resize, scale to [0, 1]
//! - Inference: the candle classifier, or simulated predictions when no
//!   artifact is present (mock mode)
//! - Post-processing: severity from confidence, treatment from the catalog

pub mod backend;
pub mod catalog;
pub mod config;
pub mod mock;
pub mod model_loader;
pub mod network;
pub mod pipeline;
pub mod preprocess;
pub mod severity;

pub use backend::{BackendInput, BackendKind, InferenceBackend, RawPrediction, RealBackend};
pub use catalog::{DiseaseCatalog, LabelSet, DEFAULT_LABELS};
pub use config::{
    ArchitectureConfig, DeviceSpec, InferenceConfig, InputSize, MockConfig, ModelConfig,
};
pub use mock::MockBackend;
pub use model_loader::{ClassifierHandle, LoadOutcome, ModelManager};
pub use pipeline::InferencePipeline;
pub use preprocess::{ImageTensor, Preprocessor};
pub use severity::derive_severity;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::backend::{BackendKind, InferenceBackend};
    pub use crate::catalog::DiseaseCatalog;
    pub use crate::config::InferenceConfig;
    pub use crate::pipeline::InferencePipeline;
    pub use leafscan_core::{Error, PredictionResult, Result, Severity};
}
