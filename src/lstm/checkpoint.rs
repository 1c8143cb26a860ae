//! Model artifact: the serialized trained classifier shared by all pipelines.
//!
//! Written by the retraining job, read by the form server and the monitoring
//! loop. JSON on disk, saved atomically (write temp file, then rename) so a
//! reader never sees a half-written model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::inference::ModelError;
use crate::lstm::cell::LstmWeights;
use crate::lstm::normalizer::FeatureScaler;

/// Current artifact format version.
pub const ARTIFACT_VERSION: u32 = 1;

/// Complete snapshot of a trained classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Format version for forward compatibility.
    pub version: u32,
    /// Input feature names in model order.
    pub feature_names: Vec<String>,
    /// Timesteps per input sequence.
    pub timesteps: usize,
    /// Learned LSTM and dense-head weights.
    pub weights: LstmWeights,
    /// Feature standardization fitted on the training rows.
    pub scaler: FeatureScaler,
    /// Provenance.
    pub metadata: ArtifactMetadata,
}

/// Metadata attached to an artifact for provenance tracking.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArtifactMetadata {
    pub created_at: Option<DateTime<Utc>>,
    /// Rows the model was trained on.
    pub rows_trained: usize,
    pub epochs: usize,
    /// Mean loss of the final epoch.
    pub final_loss: Option<f64>,
    /// Experiment tracking run that produced this artifact.
    pub run_id: Option<String>,
    /// Free-form note; retraining records its placeholder target scheme here.
    pub target_source: Option<String>,
}

impl ModelArtifact {
    /// Check internal consistency (dimensions, version).
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != ARTIFACT_VERSION {
            return Err(ModelError::UnsupportedVersion {
                found: self.version,
                expected: ARTIFACT_VERSION,
            });
        }
        self.weights.validate().map_err(ModelError::Incompatible)?;

        let width = self.weights.input_width;
        if self.scaler.width() != width || !self.scaler.is_consistent() {
            return Err(ModelError::Incompatible(format!(
                "scaler covers {} features, weights expect {width}",
                self.scaler.width()
            )));
        }
        if !self.feature_names.is_empty() && self.feature_names.len() != width {
            return Err(ModelError::Incompatible(format!(
                "{} feature names for {width} inputs",
                self.feature_names.len()
            )));
        }
        if self.timesteps == 0 {
            return Err(ModelError::Incompatible("timesteps must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Save an artifact to disk atomically.
pub fn save_to_disk(artifact: &ModelArtifact, path: &Path) -> Result<(), ModelError> {
    let io_err = |source: std::io::Error| ModelError::Io {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(artifact).map_err(|e| ModelError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &json).map_err(io_err)?;
    std::fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}

/// Load and validate an artifact from disk.
pub fn load_from_disk(path: &Path) -> Result<ModelArtifact, ModelError> {
    let data = std::fs::read(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let artifact: ModelArtifact =
        serde_json::from_slice(&data).map_err(|e| ModelError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    artifact.validate()?;
    Ok(artifact)
}
