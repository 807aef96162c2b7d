//! Model loading and lifecycle for the leaf classifier

use crate::backend::{InferenceBackend, RealBackend};
use crate::catalog::{DiseaseCatalog, LabelSet};
use crate::config::{DeviceSpec, InputSize, MockConfig, ModelConfig};
use crate::mock::MockBackend;
use crate::network::LeafNet;
use crate::preprocess::{ImageTensor, CHANNELS};
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::VarBuilder;
use leafscan_core::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const HEAD_WEIGHT: &str = "head.weight";

/// Result of the one-time load attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Artifact loaded and validated
    Loaded { classes: usize },
    /// No artifact found; predictions are simulated
    Mock,
}

/// Loaded classifier: network, labels and the device it runs on
pub struct ClassifierHandle {
    network: LeafNet,
    labels: LabelSet,
    device: Device,
    input_size: InputSize,
    artifact_path: PathBuf,
}

impl std::fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierHandle")
            .field("artifact_path", &self.artifact_path)
            .field("classes", &self.labels.len())
            .field("input_size", &self.input_size)
            .finish()
    }
}

impl ClassifierHandle {
    /// Load a safetensors artifact and build the network from it
    pub fn load(config: &ModelConfig, labels: LabelSet) -> Result<Self> {
        let device = create_device(config.device)?;
        let path = &config.path;

        let tensors = candle_core::safetensors::load(path, &device).map_err(|e| {
            Error::model_load(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let head = tensors.get(HEAD_WEIGHT).ok_or_else(|| {
            Error::model_load(format!("{} has no '{}' tensor", path.display(), HEAD_WEIGHT))
        })?;
        let classes = match head.dims() {
            [classes, _] => *classes,
            dims => {
                return Err(Error::model_load(format!(
                    "'{}' has shape {:?}, expected [classes, features]",
                    HEAD_WEIGHT, dims
                )))
            }
        };
        labels.ensure_width(classes)?;

        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let network = LeafNet::load(vb, CHANNELS, &config.architecture.channels, classes)
            .map_err(|e| Error::model_load(format!("Failed to build network: {}", e)))?;

        Ok(Self {
            network,
            labels,
            device,
            input_size: config.input_size,
            artifact_path: path.clone(),
        })
    }

    /// One forward pass; returns the argmax class and its probability
    pub fn infer(&self, image: &ImageTensor) -> Result<(usize, f32)> {
        let [_, height, width, _] = image.shape();
        if height != self.input_size.height as usize || width != self.input_size.width as usize {
            return Err(Error::inference(format!(
                "input is {}x{}, model expects {}x{}",
                height, width, self.input_size.height, self.input_size.width
            )));
        }

        let input = image.to_tensor(&self.device)?;
        let probs = self
            .probabilities(&input)
            .map_err(|e| Error::inference(format!("Forward pass failed: {}", e)))?;

        if probs.len() != self.labels.len() {
            return Err(Error::inference(format!(
                "model produced {} scores for {} labels",
                probs.len(),
                self.labels.len()
            )));
        }

        probs
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })
            .ok_or_else(|| Error::inference("model produced no scores"))
    }

    fn probabilities(&self, input: &Tensor) -> candle_core::Result<Vec<f32>> {
        // NHWC -> NCHW
        let input = input.permute((0, 3, 1, 2))?.contiguous()?;

        let logits = self.network.forward(&input)?;
        candle_nn::ops::softmax(&logits, D::Minus1)?
            .squeeze(0)?
            .to_vec1::<f32>()
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index)
    }
}

enum ModelState {
    Unloaded,
    Mock,
    Loaded(Arc<ClassifierHandle>),
}

/// Owns the classifier from startup until it is turned into a backend
pub struct ModelManager {
    config: ModelConfig,
    labels: LabelSet,
    state: ModelState,
}

impl ModelManager {
    /// Validate the label set; no I/O happens here
    pub fn new(config: ModelConfig) -> Result<Self> {
        let labels = LabelSet::new(config.labels.iter().cloned())?;
        Ok(Self {
            config,
            labels,
            state: ModelState::Unloaded,
        })
    }

    /// Attempt to load the artifact. May only be called once.
    pub fn load(&mut self) -> Result<LoadOutcome> {
        if !matches!(self.state, ModelState::Unloaded) {
            return Err(Error::config("model load was already attempted"));
        }

        let path = &self.config.path;
        if !path.exists() {
            warn!(
                path = %path.display(),
                "Model artifact not found, serving simulated predictions"
            );
            self.state = ModelState::Mock;
            return Ok(LoadOutcome::Mock);
        }

        let handle = ClassifierHandle::load(&self.config, self.labels.clone())?;
        let classes = handle.labels().len();
        info!(
            path = %path.display(),
            classes,
            device = ?self.config.device,
            "Loaded leaf classifier"
        );

        self.state = ModelState::Loaded(Arc::new(handle));
        Ok(LoadOutcome::Loaded { classes })
    }

    pub fn is_mock(&self) -> bool {
        matches!(self.state, ModelState::Mock)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ModelState::Loaded(_))
    }

    /// Run the loaded classifier on one tensor
    pub fn infer(&self, image: &ImageTensor) -> Result<(usize, f32)> {
        match &self.state {
            ModelState::Loaded(handle) => handle.infer(image),
            _ => Err(Error::inference("model not loaded")),
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Convert into the backend matching the load outcome
    pub fn into_backend(
        self,
        catalog: Arc<DiseaseCatalog>,
        mock: &MockConfig,
    ) -> Result<Arc<dyn InferenceBackend>> {
        match self.state {
            ModelState::Loaded(handle) => Ok(Arc::new(RealBackend::new(handle))),
            ModelState::Mock => Ok(Arc::new(MockBackend::new(catalog, mock)?)),
            ModelState::Unloaded => Err(Error::config(
                "model manager must be loaded before building a backend",
            )),
        }
    }
}

/// Create a candle device from its config form
pub fn create_device(spec: DeviceSpec) -> Result<Device> {
    match spec {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda { index } => Device::new_cuda(index)
            .map_err(|e| Error::model_load(format!("Failed to create CUDA device: {}", e))),
        DeviceSpec::Metal { index } => Device::new_metal(index)
            .map_err(|e| Error::model_load(format!("Failed to create Metal device: {}", e))),
    }
}
