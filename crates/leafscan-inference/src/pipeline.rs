//! Inference pipeline: preprocess, infer, derive severity and treatment
//!
//! The pipeline is built once at startup and shared through `Arc`. Each call
//! to [`InferencePipeline::predict`] is synchronous and independent of every
//! other call.

use crate::backend::{BackendInput, BackendKind, InferenceBackend, RawPrediction};
use crate::catalog::DiseaseCatalog;
use crate::config::InferenceConfig;
use crate::model_loader::{LoadOutcome, ModelManager};
use crate::preprocess::Preprocessor;
use crate::severity::derive_severity;
use leafscan_core::{Error, PredictionResult, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Turns image bytes into a [`PredictionResult`]
#[derive(Clone)]
pub struct InferencePipeline {
    backend: Arc<dyn InferenceBackend>,
    catalog: Arc<DiseaseCatalog>,
    preprocessor: Preprocessor,
}

impl std::fmt::Debug for InferencePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferencePipeline")
            .field("backend", &self.backend.name())
            .field("mode", &self.mode())
            .field("catalog_entries", &self.catalog.len())
            .field("preprocessor", &self.preprocessor)
            .finish()
    }
}

impl InferencePipeline {
    /// Assemble a pipeline from parts
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        catalog: Arc<DiseaseCatalog>,
        preprocessor: Preprocessor,
    ) -> Self {
        Self {
            backend,
            catalog,
            preprocessor,
        }
    }

    /// Build the catalog, load the model once and select the backend.
    ///
    /// A missing artifact yields a mock-mode pipeline; a broken one is an
    /// `Error::ModelLoad`.
    pub fn from_config(config: &InferenceConfig) -> Result<Self> {
        config.validate()?;

        let catalog = match &config.catalog_path {
            Some(path) => DiseaseCatalog::from_file(path)?,
            None => DiseaseCatalog::builtin(),
        };
        let catalog = Arc::new(catalog);

        let mut manager = ModelManager::new(config.model.clone())?;
        let outcome = manager.load()?;

        if let LoadOutcome::Loaded { .. } = outcome {
            for label in manager.labels().iter().filter(|l| !catalog.contains(l)) {
                warn!(label, "Label has no catalog entry, fallback treatment applies");
            }
        }

        let backend = manager.into_backend(Arc::clone(&catalog), &config.mock)?;
        info!(
            backend = backend.name(),
            mode = %backend.kind(),
            catalog_entries = catalog.len(),
            "Inference pipeline ready"
        );

        Ok(Self::new(
            backend,
            catalog,
            Preprocessor::new(config.model.input_size),
        ))
    }

    /// Diagnose one image
    pub fn predict(&self, bytes: &[u8]) -> Result<PredictionResult> {
        let start = Instant::now();

        let raw = match self.backend.kind() {
            BackendKind::Model => {
                let tensor = self.preprocessor.preprocess(bytes)?;
                self.backend.infer(BackendInput::Tensor(&tensor))
            }
            BackendKind::Simulated => {
                if bytes.is_empty() {
                    return Err(Error::invalid_image("empty image buffer"));
                }
                self.backend.infer(BackendInput::Raw(bytes))
            }
        }
        .map_err(|e| match e {
            Error::Inference(_) => e,
            other => Error::inference(other.to_string()),
        })?;

        let result = self.postprocess(raw)?;

        debug!(
            disease = %result.disease_name,
            confidence = result.confidence,
            severity = %result.severity,
            latency_us = start.elapsed().as_micros() as u64,
            "Prediction complete"
        );

        Ok(result)
    }

    fn postprocess(&self, raw: RawPrediction) -> Result<PredictionResult> {
        if !(0.0..=1.0).contains(&raw.confidence) {
            return Err(Error::inference(format!(
                "backend '{}' returned confidence {} outside [0, 1]",
                self.backend.name(),
                raw.confidence
            )));
        }

        let severity = derive_severity(raw.confidence, &raw.label);
        let treatment = self.catalog.resolve(&raw.label);

        let result = PredictionResult::new(raw.label, raw.confidence, severity, treatment);
        if result.is_fallback_treatment() {
            debug!(disease = %result.disease_name, "No catalog entry, using fallback treatment");
        }
        Ok(result)
    }

    /// Whether predictions come from the model or are simulated
    pub fn mode(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn catalog(&self) -> &DiseaseCatalog {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockConfig;
    use crate::mock::MockBackend;
    use leafscan_core::{Severity, FALLBACK_TREATMENT};

    struct FixedBackend {
        label: &'static str,
        confidence: f32,
    }

    impl InferenceBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        fn kind(&self) -> BackendKind {
            BackendKind::Simulated
        }

        fn infer(&self, _input: BackendInput<'_>) -> Result<RawPrediction> {
            Ok(RawPrediction::new(self.label, self.confidence))
        }
    }

    fn pipeline(label: &'static str, confidence: f32) -> InferencePipeline {
        InferencePipeline::new(
            Arc::new(FixedBackend { label, confidence }),
            Arc::new(DiseaseCatalog::builtin()),
            Preprocessor::default(),
        )
    }

    #[test]
    fn test_postprocess_attaches_severity_and_treatment() {
        let result = pipeline("Apple Scab", 0.95).predict(b"bytes").unwrap();
        assert_eq!(result.disease_name, "Apple Scab");
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.treatment[0], "Prune trees to increase sun exposure");
    }

    #[test]
    fn test_unknown_label_gets_fallback() {
        let result = pipeline("Citrus Canker", 0.8).predict(b"bytes").unwrap();
        assert_eq!(result.treatment, vec![FALLBACK_TREATMENT.to_string()]);
        assert_eq!(result.severity, Severity::Medium);
    }

    #[test]
    fn test_rejects_out_of_range_confidence() {
        for confidence in [f32::NAN, -0.1, 1.5] {
            let err = pipeline("Apple Scab", confidence).predict(b"bytes").unwrap_err();
            assert!(matches!(err, Error::Inference(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_mock_mode_rejects_empty_bytes() {
        let backend = MockBackend::new(Arc::new(DiseaseCatalog::builtin()), &MockConfig::default()).unwrap();
        let pipeline = InferencePipeline::new(
            Arc::new(backend),
            Arc::new(DiseaseCatalog::builtin()),
            Preprocessor::default(),
        );

        assert_eq!(pipeline.mode(), BackendKind::Simulated);
        assert!(matches!(pipeline.predict(&[]), Err(Error::InvalidImage(_))));
        assert!(pipeline.predict(b"not decoded in mock mode").is_ok());
    }
}
