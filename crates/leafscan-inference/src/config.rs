//! Configuration for the model artifact, preprocessing and mock mode

use crate::catalog::DEFAULT_LABELS;
use leafscan_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the whole inference pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Model artifact and architecture
    #[serde(default)]
    pub model: ModelConfig,

    /// YAML file with disease → treatment entries (built-in catalog if unset)
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Simulated predictions used while no artifact is loaded
    #[serde(default)]
    pub mock: MockConfig,
}

/// Configuration for loading the classifier artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the safetensors artifact
    #[serde(default = "default_model_path")]
    pub path: PathBuf,

    /// Spatial dimensions the network was trained on
    #[serde(default)]
    pub input_size: InputSize,

    /// Class labels in output-index order
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,

    /// Device to run inference on
    #[serde(default)]
    pub device: DeviceSpec,

    /// Network layout
    #[serde(default)]
    pub architecture: ArchitectureConfig,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/plant_disease_model.safetensors")
}

fn default_labels() -> Vec<String> {
    DEFAULT_LABELS.iter().map(|l| l.to_string()).collect()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            input_size: InputSize::default(),
            labels: default_labels(),
            device: DeviceSpec::default(),
            architecture: ArchitectureConfig::default(),
        }
    }
}

impl ModelConfig {
    /// Create a new model configuration from a local artifact path
    pub fn from_local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set class labels
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Set device
    pub fn with_device(mut self, device: DeviceSpec) -> Self {
        self.device = device;
        self
    }

    /// Set convolution channel widths
    pub fn with_channels(mut self, channels: Vec<usize>) -> Self {
        self.architecture.channels = channels;
        self
    }

    /// Set input size
    pub fn with_input_size(mut self, height: u32, width: u32) -> Self {
        self.input_size = InputSize { height, width };
        self
    }
}

/// Model input spatial dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSize {
    pub height: u32,
    pub width: u32,
}

impl Default for InputSize {
    fn default() -> Self {
        Self {
            height: 224,
            width: 224,
        }
    }
}

/// Device specification (for config files)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda {
        #[serde(default)]
        index: usize,
    },
    Metal {
        #[serde(default)]
        index: usize,
    },
}

/// Layout of the convolutional network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureConfig {
    /// Output channels of each conv block, in order
    #[serde(default = "default_channels")]
    pub channels: Vec<usize>,
}

fn default_channels() -> Vec<usize> {
    vec![16, 32, 64]
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
        }
    }
}

/// Mock-mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    /// Lower bound of the simulated confidence
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Upper bound of the simulated confidence (inclusive)
    #[serde(default = "default_max_confidence")]
    pub max_confidence: f32,

    /// Fixed RNG seed; entropy-seeded when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_min_confidence() -> f32 {
    0.75
}

fn default_max_confidence() -> f32 {
    0.99
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            max_confidence: default_max_confidence(),
            seed: None,
        }
    }
}

impl InferenceConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse inference config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot express
    pub fn validate(&self) -> Result<()> {
        let size = self.model.input_size;
        if size.height == 0 || size.width == 0 {
            return Err(Error::config(format!(
                "input size must be non-zero, got {}x{}",
                size.height, size.width
            )));
        }

        let channels = &self.model.architecture.channels;
        if channels.is_empty() || channels.contains(&0) {
            return Err(Error::config(
                "architecture.channels must list at least one non-zero width",
            ));
        }

        let mock = &self.mock;
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !in_unit(mock.min_confidence)
            || !in_unit(mock.max_confidence)
            || mock.min_confidence > mock.max_confidence
        {
            return Err(Error::config(format!(
                "mock confidence range [{}, {}] must lie within [0, 1]",
                mock.min_confidence, mock.max_confidence
            )));
        }

        Ok(())
    }
}
