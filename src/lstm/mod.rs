//! LSTM failure classifier.
//!
//! A single LSTM layer (64 units by default) feeding a one-unit dense layer
//! with sigmoid activation. The output is the probability that the machine
//! is heading for a failure.
//!
//! ## Architecture
//!
//! - Input: `timesteps × input_width` sequence, standardized per feature
//!   with statistics fitted on the training rows
//! - LSTM: gates i/f/g/o, zero initial state, forget bias 1.0
//! - Head: `sigmoid(w_out · h_T + b_out)`
//! - Training: binary cross-entropy, Adam, mini-batches, global-norm clipping
//!
//! Everything needed to reproduce a prediction (weights, scaler, feature
//! names) lives in a [`checkpoint::ModelArtifact`].

pub mod cell;
pub mod checkpoint;
pub mod normalizer;
pub mod training;

use chrono::Utc;

use crate::inference::{Model, ModelError, SequenceBatch, SEQUENCE_TIMESTEPS};
use cell::{LstmCell, LstmWeights};
use checkpoint::{ArtifactMetadata, ModelArtifact, ARTIFACT_VERSION};
use normalizer::FeatureScaler;
use training::{EpochStats, FitOptions, TrainingError};

/// Default LSTM width.
pub const DEFAULT_HIDDEN_UNITS: usize = 64;

/// LSTM + dense sigmoid classifier.
#[derive(Debug, Clone)]
pub struct LstmClassifier {
    weights: LstmWeights,
    scaler: FeatureScaler,
    feature_names: Vec<String>,
    timesteps: usize,
    metadata: ArtifactMetadata,
}

impl LstmClassifier {
    /// Fresh, untrained classifier with deterministic initialization.
    pub fn new(input_width: usize, hidden_units: usize, seed: u64) -> Self {
        Self {
            weights: LstmWeights::init(input_width, hidden_units, seed),
            scaler: FeatureScaler::new(input_width),
            feature_names: Vec::new(),
            timesteps: SEQUENCE_TIMESTEPS,
            metadata: ArtifactMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = names;
        self
    }

    /// Restore from a loaded artifact (validated again here).
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        artifact.validate()?;
        Ok(Self {
            weights: artifact.weights,
            scaler: artifact.scaler,
            feature_names: artifact.feature_names,
            timesteps: artifact.timesteps,
            metadata: artifact.metadata,
        })
    }

    /// Snapshot into an artifact, stamping the creation time.
    pub fn to_artifact(&self, metadata: ArtifactMetadata) -> ModelArtifact {
        ModelArtifact {
            version: ARTIFACT_VERSION,
            feature_names: self.feature_names.clone(),
            timesteps: self.timesteps,
            weights: self.weights.clone(),
            scaler: self.scaler.clone(),
            metadata: ArtifactMetadata {
                created_at: Some(Utc::now()),
                ..metadata
            },
        }
    }

    /// Fit the feature scaler on raw rows (each `input_width` long).
    pub fn fit_scaler<'a>(&mut self, rows: impl IntoIterator<Item = &'a [f64]>) {
        self.scaler = FeatureScaler::fit(self.weights.input_width, rows);
    }

    /// Fit scaler and weights on a raw batch.
    ///
    /// The scaler is fitted on every timestep of every row first, then the
    /// weights are trained on the scaled sequences.
    pub fn fit(
        &mut self,
        batch: &SequenceBatch,
        targets: &[f64],
        options: &FitOptions,
        on_epoch: impl FnMut(&EpochStats),
    ) -> Result<Vec<EpochStats>, TrainingError> {
        training::validate_training_data(&self.weights, batch, targets)?;

        let width = batch.features();
        self.timesteps = batch.timesteps();
        self.fit_scaler(batch.sequences().flat_map(|s| s.chunks(width)));

        let scaled: Vec<Vec<f64>> = batch.sequences().map(|s| self.scaler.transform(s)).collect();
        training::fit(&mut self.weights, &scaled, targets, options, on_epoch)
    }

    /// Probability for one raw (unscaled) flattened sequence.
    pub fn predict_one(&self, sequence: &[f64]) -> f64 {
        let scaled = self.scaler.transform(sequence);
        LstmCell::forward(&self.weights, &scaled).output
    }

    pub fn hidden_units(&self) -> usize {
        self.weights.hidden_units
    }

    pub fn scaler(&self) -> &FeatureScaler {
        &self.scaler
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }
}

impl Model for LstmClassifier {
    fn input_width(&self) -> usize {
        self.weights.input_width
    }

    fn timesteps(&self) -> usize {
        self.timesteps
    }

    fn feature_names(&self) -> Vec<String> {
        self.feature_names.clone()
    }

    fn predict(&self, batch: &SequenceBatch) -> Result<Vec<f64>, ModelError> {
        if batch.features() != self.weights.input_width {
            return Err(ModelError::ShapeMismatch {
                expected: self.weights.input_width,
                actual: batch.features(),
            });
        }
        if batch.timesteps() != self.timesteps {
            return Err(ModelError::TimestepMismatch {
                expected: self.timesteps,
                actual: batch.timesteps(),
            });
        }
        Ok(batch.sequences().map(|s| self.predict_one(s)).collect())
    }
}
