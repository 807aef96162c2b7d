//! LeafScan Core
//!
//! Core types and error handling shared across LeafScan components.
//!
//! This crate provides:
//! - The `PredictionResult` value object returned by the inference pipeline
//! - The `Severity` triage tier
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{PredictionResult, Severity, FALLBACK_TREATMENT};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{PredictionResult, Severity};
}
