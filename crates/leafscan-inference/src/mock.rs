//! Simulated predictions for running without a trained model

use crate::backend::{BackendInput, BackendKind, InferenceBackend, RawPrediction};
use crate::catalog::DiseaseCatalog;
use crate::config::MockConfig;
use leafscan_core::{Error, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Picks a catalog entry and a confidence uniformly at random
pub struct MockBackend {
    catalog: Arc<DiseaseCatalog>,
    min_confidence: f32,
    max_confidence: f32,
    rng: Mutex<StdRng>,
}

impl MockBackend {
    pub fn new(catalog: Arc<DiseaseCatalog>, config: &MockConfig) -> Result<Self> {
        if catalog.is_empty() {
            return Err(Error::config("mock backend needs a non-empty catalog"));
        }
        if config.min_confidence.is_nan()
            || config.max_confidence.is_nan()
            || config.min_confidence > config.max_confidence
        {
            return Err(Error::config(format!(
                "invalid mock confidence range [{}, {}]",
                config.min_confidence, config.max_confidence
            )));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            catalog,
            min_confidence: config.min_confidence,
            max_confidence: config.max_confidence,
            rng: Mutex::new(rng),
        })
    }
}

impl InferenceBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    fn infer(&self, _input: BackendInput<'_>) -> Result<RawPrediction> {
        let (index, confidence) = {
            let mut rng = self.rng.lock();
            (
                rng.gen_range(0..self.catalog.len()),
                rng.gen_range(self.min_confidence..=self.max_confidence),
            )
        };

        let (label, _) = self
            .catalog
            .entry_at(index)
            .ok_or_else(|| Error::internal(format!("catalog has no entry {}", index)))?;

        Ok(RawPrediction::new(label, confidence))
    }
}
