//! Retraining job: fits a fresh LSTM classifier on a sensor table and writes
//! the artifact the form server and monitoring loop load.
//!
//! The sensor log carries no failure labels, so the job trains against
//! [`PlaceholderTargets`]. The whole job runs inside one tracked experiment
//! run; the run is closed as `Completed` only after the artifact is on disk.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;
use crate::dataset::SensorTable;
use crate::inference::{ModelError, SequenceBatch};
use crate::lstm::checkpoint::{self, ArtifactMetadata};
use crate::lstm::training::{EpochStats, FitOptions, TrainingError};
use crate::lstm::LstmClassifier;
use crate::tracking::storage::TrackingBackend;
use crate::tracking::{ExperimentTracker, TrackingError};

/// Stand-in training labels: seeded uniform values in `[0, 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderTargets {
    values: Vec<f64>,
}

impl PlaceholderTargets {
    /// Recorded in the artifact and the tracking run.
    pub const SOURCE: &'static str = "placeholder:uniform[0,1)";

    pub fn uniform(count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            values: (0..count).map(|_| rng.gen::<f64>()).collect(),
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum RetrainError {
    #[error("no rows to train on")]
    EmptyDataset,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("training failed: {0}")]
    Training(#[from] TrainingError),

    #[error("experiment tracking failed: {0}")]
    Tracking(#[from] TrackingError),
}

/// Summary of a finished retraining run.
#[derive(Debug, Clone)]
pub struct RetrainReport {
    pub run_id: String,
    pub rows: usize,
    pub features: usize,
    pub history: Vec<EpochStats>,
    pub artifact_path: PathBuf,
}

impl RetrainReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.history.last().map(|s| s.loss)
    }
}

/// One retraining job: LSTM(hidden_units) -> Dense(1, sigmoid), Adam, BCE.
#[derive(Debug, Clone)]
pub struct RetrainingJob {
    artifact_path: PathBuf,
    hidden_units: usize,
    fit: FitOptions,
    run_name: Option<String>,
}

impl RetrainingJob {
    pub fn new(artifact_path: impl Into<PathBuf>, hidden_units: usize, fit: FitOptions) -> Self {
        Self {
            artifact_path: artifact_path.into(),
            hidden_units,
            fit,
            run_name: Some("retrain".to_string()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.model.artifact_path.clone(),
            config.training.hidden_units,
            config.training.fit_options(),
        )
    }

    #[must_use]
    pub fn with_run_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = Some(name.into());
        self
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn fit_options(&self) -> &FitOptions {
        &self.fit
    }

    /// Train on every row of `table` and write the artifact.
    ///
    /// Any error leaves the tracking run closed as `Failed` and the
    /// previous artifact (if any) untouched.
    pub fn run<B: TrackingBackend>(
        &self,
        table: &SensorTable,
        tracker: &mut ExperimentTracker<B>,
    ) -> Result<RetrainReport, RetrainError> {
        let mut run = tracker.begin(self.run_name.as_deref())?;
        let run_id = run.run_id().to_string();

        run.log_param("epochs", self.fit.epochs)?;
        run.log_param("batch_size", self.fit.batch_size)?;
        run.log_param("optimizer", "adam")?;
        run.log_param("learning_rate", self.fit.learning_rate)?;
        run.log_param("loss", "binary_crossentropy")?;
        run.log_param("hidden_units", self.hidden_units)?;
        run.log_param("seed", self.fit.seed)?;
        run.log_param("rows", table.len())?;
        run.log_param("features", table.columns().join(","))?;
        run.log_param("targets", PlaceholderTargets::SOURCE)?;

        if table.is_empty() {
            return Err(RetrainError::EmptyDataset);
        }

        let batch = SequenceBatch::from_rows(table.rows())?;
        let targets = PlaceholderTargets::uniform(table.len(), self.fit.seed);

        let mut classifier = LstmClassifier::new(batch.features(), self.hidden_units, self.fit.seed)
            .with_feature_names(table.columns().to_vec());

        info!(
            rows = batch.rows(),
            features = batch.features(),
            hidden_units = self.hidden_units,
            epochs = self.fit.epochs,
            "Retraining started"
        );

        let mut tracking_failure = None;
        let history = classifier.fit(&batch, targets.as_slice(), &self.fit, |stats| {
            info!(epoch = stats.epoch, loss = stats.loss, "Epoch finished");
            if tracking_failure.is_none() {
                if let Err(e) = run.log_metric("loss", stats.loss, stats.epoch as u64) {
                    tracking_failure = Some(e);
                }
            }
        })?;
        if let Some(e) = tracking_failure {
            return Err(e.into());
        }

        let artifact = classifier.to_artifact(ArtifactMetadata {
            rows_trained: batch.rows(),
            epochs: history.len(),
            final_loss: history.last().map(|s| s.loss),
            run_id: Some(run_id.clone()),
            target_source: Some(PlaceholderTargets::SOURCE.to_string()),
            ..ArtifactMetadata::default()
        });
        checkpoint::save_to_disk(&artifact, &self.artifact_path)?;
        run.log_artifact(&self.artifact_path.display().to_string())?;
        run.finish()?;

        info!(
            run_id = %run_id,
            path = %self.artifact_path.display(),
            "Retraining finished, artifact written"
        );

        Ok(RetrainReport {
            run_id,
            rows: batch.rows(),
            features: batch.features(),
            history,
            artifact_path: self.artifact_path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::InferenceAdapter;
    use crate::tracking::storage::InMemoryBackend;
    use crate::tracking::RunStatus;

    fn sample_table(n: usize) -> SensorTable {
        let rows = (0..n)
            .map(|i| {
                let x = i as f64;
                vec![1400.0 + x, 40.0 + 0.1 * x, x, 0.1, 308.0]
            })
            .collect();
        SensorTable::from_rows(
            crate::dataset::SENSOR_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        )
    }

    fn small_job(path: PathBuf) -> RetrainingJob {
        RetrainingJob::new(
            path,
            8,
            FitOptions {
                epochs: 2,
                batch_size: 4,
                ..FitOptions::default()
            },
        )
    }

    #[test]
    fn test_placeholder_targets_are_seeded_unit_interval() {
        let a = PlaceholderTargets::uniform(100, 42);
        let b = PlaceholderTargets::uniform(100, 42);
        assert_eq!(a, b);
        assert_eq!(a.len(), 100);
        assert!(a.as_slice().iter().all(|&t| (0.0..1.0).contains(&t)));
        assert_ne!(a, PlaceholderTargets::uniform(100, 43));
    }

    #[test]
    fn test_run_writes_artifact_and_completes_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lstm_model.json");
        let mut tracker = ExperimentTracker::new("test", InMemoryBackend::new());

        let report = small_job(path.clone()).run(&sample_table(10), &mut tracker).unwrap();

        assert_eq!(report.rows, 10);
        assert_eq!(report.features, 5);
        assert_eq!(report.history.len(), 2);
        assert!(report.final_loss().unwrap().is_finite());

        let run = tracker.get_run(&report.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.params["optimizer"], "adam");
        assert_eq!(run.params["loss"], "binary_crossentropy");
        assert_eq!(run.params["batch_size"], "4");
        assert_eq!(run.metrics["loss"].len(), 2);
        assert_eq!(run.artifacts, vec![path.display().to_string()]);

        let artifact = checkpoint::load_from_disk(&path).unwrap();
        assert_eq!(artifact.metadata.run_id.as_deref(), Some(report.run_id.as_str()));
        assert_eq!(artifact.metadata.rows_trained, 10);
        assert_eq!(artifact.metadata.target_source.as_deref(), Some(PlaceholderTargets::SOURCE));
        assert_eq!(artifact.feature_names[0], "Rotational_speed");

        let adapter = InferenceAdapter::load(&path).unwrap();
        assert_eq!(adapter.input_width(), 5);
    }

    #[test]
    fn test_empty_table_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lstm_model.json");
        let mut tracker = ExperimentTracker::new("test", InMemoryBackend::new());

        let err = small_job(path.clone()).run(&sample_table(0), &mut tracker).unwrap_err();
        assert!(matches!(err, RetrainError::EmptyDataset));
        assert!(!path.exists());

        let runs = tracker.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Failed);
    }

    #[test]
    fn test_table_without_columns_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lstm_model.json");
        let mut tracker = ExperimentTracker::new("test", InMemoryBackend::new());
        let table = SensorTable::from_rows(Vec::new(), vec![Vec::new(); 4]);

        let err = small_job(path.clone()).run(&table, &mut tracker).unwrap_err();
        assert!(matches!(err, RetrainError::Training(TrainingError::NoFeatures)));
        assert!(!path.exists());

        let runs = tracker.list_runs().unwrap();
        assert_eq!(runs[0].status, RunStatus::Failed);
    }

    #[test]
    fn test_unwritable_artifact_path_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let path = blocker.join("lstm_model.json");
        let mut tracker = ExperimentTracker::new("test", InMemoryBackend::new());

        let err = small_job(path).run(&sample_table(6), &mut tracker).unwrap_err();
        assert!(matches!(err, RetrainError::Model(ModelError::Io { .. })));

        let runs = tracker.list_runs().unwrap();
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert_eq!(runs[0].metrics["loss"].len(), 2);
    }

    #[test]
    fn test_from_config_uses_training_section() {
        let mut config = AppConfig::default();
        config.training.epochs = 7;
        config.model.artifact_path = PathBuf::from("out/model.json");
        let job = RetrainingJob::from_config(&config);
        assert_eq!(job.fit_options().epochs, 7);
        assert_eq!(job.artifact_path(), Path::new("out/model.json"));
    }
}
