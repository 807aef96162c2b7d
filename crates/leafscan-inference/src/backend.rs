//! Inference backends: the loaded classifier and its stand-ins

use crate::model_loader::ClassifierHandle;
use crate::preprocess::ImageTensor;
use leafscan_core::{Error, Result};
use std::sync::Arc;

/// What kind of input a backend consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Real model; needs a preprocessed tensor
    Model,
    /// Simulated predictions; the image is not decoded
    Simulated,
}

impl BackendKind {
    /// Label used in readiness output and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Simulated => "mock",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input handed to a backend
#[derive(Debug, Clone, Copy)]
pub enum BackendInput<'a> {
    Tensor(&'a ImageTensor),
    Raw(&'a [u8]),
}

/// Backend output before severity and treatment are attached
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    /// Predicted disease label
    pub label: String,

    /// Confidence (0.0-1.0)
    pub confidence: f32,

    /// Output index of the model; `None` for simulated predictions
    pub class_index: Option<usize>,
}

impl RawPrediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            class_index: None,
        }
    }

    pub fn with_class_index(mut self, index: usize) -> Self {
        self.class_index = Some(index);
        self
    }
}

/// Trait for anything that can turn an image into a raw prediction
pub trait InferenceBackend: Send + Sync {
    /// Backend name, for logs
    fn name(&self) -> &str;

    /// Input kind this backend expects
    fn kind(&self) -> BackendKind;

    /// Produce a prediction for one image
    fn infer(&self, input: BackendInput<'_>) -> Result<RawPrediction>;
}

/// Backend over a loaded classifier
#[derive(Debug, Clone)]
pub struct RealBackend {
    handle: Arc<ClassifierHandle>,
}

impl RealBackend {
    pub fn new(handle: Arc<ClassifierHandle>) -> Self {
        Self { handle }
    }
}

impl InferenceBackend for RealBackend {
    fn name(&self) -> &str {
        "leafnet"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Model
    }

    fn infer(&self, input: BackendInput<'_>) -> Result<RawPrediction> {
        let tensor = match input {
            BackendInput::Tensor(tensor) => tensor,
            BackendInput::Raw(_) => {
                return Err(Error::inference("model backend requires a preprocessed tensor"))
            }
        };

        let (index, confidence) = self.handle.infer(tensor)?;
        let label = self.handle.label(index).ok_or_else(|| {
            Error::inference(format!("class index {} has no label", index))
        })?;

        Ok(RawPrediction::new(label, confidence).with_class_index(index))
    }
}
