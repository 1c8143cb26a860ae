//! Inference adapter: reshape feature rows, run the model, threshold.
//!
//! The model sits behind the [`Model`] trait and is owned through an
//! explicit [`InferenceAdapter`] handle created at startup. Pipelines receive
//! the handle; tests hand in a fake model instead of an artifact.
//!
//! Every pipeline feeds the recurrent model single-timestep sequences, so a
//! batch of N rows of width F is presented as an N×1×F [`SequenceBatch`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::lstm::checkpoint;
use crate::lstm::LstmClassifier;
use crate::types::{MaintenanceLabel, Prediction};

/// Timesteps per sequence for every pipeline in this crate.
pub const SEQUENCE_TIMESTEPS: usize = 1;

/// Model loading and invocation failures.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("unsupported model artifact version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("model artifact is internally inconsistent: {0}")]
    Incompatible(String),

    #[error("model expects {expected} features per timestep, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("model expects {expected} timesteps, got {actual}")]
    TimestepMismatch { expected: usize, actual: usize },

    #[error("row {row} has {actual} features, expected {expected}")]
    RaggedBatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("model returned {actual} outputs for {expected} rows")]
    OutputCount { expected: usize, actual: usize },

    #[error("model returned non-finite output {value} for row {row}")]
    InvalidOutput { row: usize, value: f64 },
}

/// Owned rank-3 input tensor: rows × timesteps × features, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceBatch {
    data: Vec<f64>,
    rows: usize,
    timesteps: usize,
    features: usize,
}

impl SequenceBatch {
    /// Build a batch from flat data and an explicit shape.
    pub fn new(data: Vec<f64>, shape: (usize, usize, usize)) -> Result<Self, ModelError> {
        let (rows, timesteps, features) = shape;
        if data.len() != rows * timesteps * features {
            return Err(ModelError::Incompatible(format!(
                "batch data has {} values, shape {rows}x{timesteps}x{features} needs {}",
                data.len(),
                rows * timesteps * features,
            )));
        }
        Ok(Self {
            data,
            rows,
            timesteps,
            features,
        })
    }

    /// Reshape N rows of width F into N×1×F, preserving row order.
    ///
    /// All rows must share the width of the first row. An empty slice
    /// yields an empty 0×1×0 batch.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, ModelError> {
        let features = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * features);

        for (row, values) in rows.iter().enumerate() {
            let values = values.as_ref();
            if values.len() != features {
                return Err(ModelError::RaggedBatch {
                    row,
                    expected: features,
                    actual: values.len(),
                });
            }
            data.extend_from_slice(values);
        }

        Ok(Self {
            data,
            rows: rows.len(),
            timesteps: SEQUENCE_TIMESTEPS,
            features,
        })
    }

    /// Logical shape `(rows, timesteps, features)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.rows, self.timesteps, self.features)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn features(&self) -> usize {
        self.features
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// All timesteps of one row, flattened (`timesteps * features` values).
    pub fn sequence(&self, row: usize) -> &[f64] {
        let len = self.timesteps * self.features;
        &self.data[row * len..(row + 1) * len]
    }

    /// Feature values at one timestep of one row.
    pub fn step(&self, row: usize, t: usize) -> &[f64] {
        let start = (row * self.timesteps + t) * self.features;
        &self.data[start..start + self.features]
    }

    /// Iterate rows as flattened sequences.
    pub fn sequences(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).map(move |r| self.sequence(r))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// A scoring model: one probability per input sequence.
pub trait Model: Send + Sync {
    /// Features per timestep the model was trained on.
    fn input_width(&self) -> usize;

    /// Timesteps per sequence the model was trained on.
    fn timesteps(&self) -> usize {
        SEQUENCE_TIMESTEPS
    }

    /// Ordered feature names, if the model records them.
    fn feature_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Score every sequence in the batch.
    fn predict(&self, batch: &SequenceBatch) -> Result<Vec<f64>, ModelError>;
}

/// Explicitly owned handle to the loaded model.
#[derive(Clone)]
pub struct InferenceAdapter {
    model: Arc<dyn Model>,
}

impl std::fmt::Debug for InferenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceAdapter")
            .field("input_width", &self.model.input_width())
            .field("timesteps", &self.model.timesteps())
            .finish()
    }
}

impl InferenceAdapter {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self { model }
    }

    /// Load the LSTM artifact from disk. Any failure is returned to the
    /// caller; there is no fallback model.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let artifact = checkpoint::load_from_disk(path)?;
        let classifier = LstmClassifier::from_artifact(artifact)?;
        info!(
            path = %path.display(),
            input_width = classifier.input_width(),
            hidden_units = classifier.hidden_units(),
            "Loaded model artifact"
        );
        Ok(Self::new(Arc::new(classifier)))
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    pub fn input_width(&self) -> usize {
        self.model.input_width()
    }

    /// Raw model scores for a batch of feature rows, in row order.
    ///
    /// The batch shape is checked against the model before it is invoked.
    pub fn scores<R: AsRef<[f64]>>(&self, rows: &[R]) -> Result<Vec<f64>, ModelError> {
        let batch = SequenceBatch::from_rows(rows)?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        self.score_batch(&batch)
    }

    /// Score an already shaped batch.
    pub fn score_batch(&self, batch: &SequenceBatch) -> Result<Vec<f64>, ModelError> {
        if batch.features() != self.model.input_width() {
            return Err(ModelError::ShapeMismatch {
                expected: self.model.input_width(),
                actual: batch.features(),
            });
        }
        if batch.timesteps() != self.model.timesteps() {
            return Err(ModelError::TimestepMismatch {
                expected: self.model.timesteps(),
                actual: batch.timesteps(),
            });
        }

        let (rows, timesteps, features) = batch.shape();
        debug!(rows, timesteps, features, "Invoking model");
        let scores = self.model.predict(batch)?;

        if scores.len() != rows {
            return Err(ModelError::OutputCount {
                expected: rows,
                actual: scores.len(),
            });
        }
        if let Some((row, &value)) = scores.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::InvalidOutput { row, value });
        }
        Ok(scores)
    }

    /// Score and threshold each row.
    pub fn predict<R: AsRef<[f64]>>(&self, rows: &[R]) -> Result<Vec<Prediction>, ModelError> {
        Ok(self
            .scores(rows)?
            .into_iter()
            .map(Prediction::from_score)
            .collect())
    }

    /// Labels only, one per row.
    pub fn predict_labels<R: AsRef<[f64]>>(
        &self,
        rows: &[R],
    ) -> Result<Vec<MaintenanceLabel>, ModelError> {
        Ok(self.predict(rows)?.into_iter().map(|p| p.label).collect())
    }
}
