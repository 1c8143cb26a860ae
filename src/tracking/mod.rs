//! Experiment Tracking
//!
//! Records one run per retraining job: hyperparameters, per-epoch metrics,
//! produced artifacts and the final status. Runs are persisted through the
//! [`TrackingBackend`](storage::TrackingBackend) trait; the default backend
//! writes one JSON file per run under `tracking.dir`.
//!
//! Use [`ExperimentTracker::begin`] to get a [`TrackedRun`] guard. The guard
//! closes the run as `Failed` when dropped, so every early return or `?` in
//! the job still leaves a closed run behind. Call [`TrackedRun::finish`] to
//! close it as `Completed`.
//!
//! ```ignore
//! let backend = JsonFileBackend::new("mlruns");
//! let mut tracker = ExperimentTracker::new("predictive-maintenance", backend);
//! let mut run = tracker.begin(Some("retrain"))?;
//! run.log_param("epochs", "3")?;
//! run.log_metric("loss", 0.61, 1)?;
//! run.log_artifact("lstm_model.json")?;
//! let record = run.finish()?;
//! ```

pub mod storage;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use storage::{TrackingBackend, TrackingStorageError};

/// Status of a tracking run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Active,
    Completed,
    Failed,
}

/// A single metric data point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub step: u64,
    pub value: f64,
}

/// A single experiment run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub run_name: Option<String>,
    pub experiment_name: String,
    pub status: RunStatus,
    /// Hyperparameters, string-encoded
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, Vec<MetricPoint>>,
    /// Artifact paths
    pub artifacts: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Run {
    fn new(run_name: Option<String>, experiment_name: String) -> Self {
        Self {
            run_id: Uuid::new_v4().simple().to_string(),
            run_name,
            experiment_name,
            status: RunStatus::Active,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
            tags: BTreeMap::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Most recent value logged for `key`.
    pub fn last_metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key)?.last().map(|p| p.value)
    }
}

/// Errors from experiment tracking operations
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Run is not active: {0}")]
    RunNotActive(String),

    #[error("Storage error: {0}")]
    Storage(#[from] TrackingStorageError),
}

pub type Result<T> = std::result::Result<T, TrackingError>;

/// Manages runs for one named experiment.
#[derive(Debug)]
pub struct ExperimentTracker<B: TrackingBackend> {
    experiment_name: String,
    tags: BTreeMap<String, String>,
    backend: B,
    /// Active runs held in memory for fast mutation
    active_runs: BTreeMap<String, Run>,
}

impl<B: TrackingBackend> ExperimentTracker<B> {
    pub fn new(experiment_name: impl Into<String>, backend: B) -> Self {
        Self {
            experiment_name: experiment_name.into(),
            tags: BTreeMap::new(),
            backend,
            active_runs: BTreeMap::new(),
        }
    }

    /// Add an experiment-level tag, inherited by runs started afterwards
    pub fn add_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    /// Start a new run and return its ID.
    pub fn start_run(&mut self, run_name: Option<&str>) -> Result<String> {
        let mut run = Run::new(run_name.map(String::from), self.experiment_name.clone());
        run.tags.extend(self.tags.clone());

        let run_id = run.run_id.clone();
        info!(run_id = %run_id, experiment = %self.experiment_name, "Tracking run started");
        self.active_runs.insert(run_id.clone(), run);
        Ok(run_id)
    }

    /// Start a run wrapped in a guard that fails it unless finished.
    pub fn begin(&mut self, run_name: Option<&str>) -> Result<TrackedRun<'_, B>> {
        let run_id = self.start_run(run_name)?;
        Ok(TrackedRun {
            tracker: self,
            run_id,
            closed: false,
        })
    }

    /// End a run with the given status and persist it.
    pub fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<Run> {
        let mut run = self
            .active_runs
            .remove(run_id)
            .ok_or_else(|| TrackingError::RunNotFound(run_id.to_string()))?;

        run.status = status;
        run.ended_at = Some(Utc::now());

        self.backend.save_run(&run)?;
        info!(run_id = %run_id, status = ?status, "Tracking run ended");
        Ok(run)
    }

    fn active_mut(&mut self, run_id: &str) -> Result<&mut Run> {
        self.active_runs
            .get_mut(run_id)
            .ok_or_else(|| TrackingError::RunNotActive(run_id.to_string()))
    }

    pub fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()> {
        debug!(run_id = %run_id, key, value, "param");
        self.active_mut(run_id)?
            .params
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn log_metric(&mut self, run_id: &str, key: &str, value: f64, step: u64) -> Result<()> {
        debug!(run_id = %run_id, key, value, step, "metric");
        self.active_mut(run_id)?
            .metrics
            .entry(key.to_string())
            .or_default()
            .push(MetricPoint { step, value });
        Ok(())
    }

    pub fn log_artifact(&mut self, run_id: &str, path: &str) -> Result<()> {
        self.active_mut(run_id)?.artifacts.push(path.to_string());
        Ok(())
    }

    /// Retrieve a run by ID, active runs first, then the backend.
    pub fn get_run(&self, run_id: &str) -> Result<Run> {
        if let Some(run) = self.active_runs.get(run_id) {
            return Ok(run.clone());
        }
        self.backend
            .load_run(run_id)
            .map_err(|e| TrackingError::RunNotFound(format!("{run_id}: {e}")))
    }

    /// All runs (active + persisted), oldest first.
    pub fn list_runs(&self) -> Result<Vec<Run>> {
        let mut runs: Vec<Run> = self.active_runs.values().cloned().collect();
        for r in self.backend.list_runs()? {
            if !self.active_runs.contains_key(&r.run_id) {
                runs.push(r);
            }
        }
        runs.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(runs)
    }
}

/// Scope guard for one active run.
///
/// Dropping the guard without calling [`finish`](Self::finish) ends the run
/// as `Failed`.
#[derive(Debug)]
pub struct TrackedRun<'a, B: TrackingBackend> {
    tracker: &'a mut ExperimentTracker<B>,
    run_id: String,
    closed: bool,
}

impl<B: TrackingBackend> TrackedRun<'_, B> {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_param(&mut self, key: &str, value: impl ToString) -> Result<()> {
        self.tracker.log_param(&self.run_id, key, &value.to_string())
    }

    pub fn log_metric(&mut self, key: &str, value: f64, step: u64) -> Result<()> {
        self.tracker.log_metric(&self.run_id, key, value, step)
    }

    pub fn log_artifact(&mut self, path: &str) -> Result<()> {
        self.tracker.log_artifact(&self.run_id, path)
    }

    /// Close the run as `Completed` and return the persisted record.
    pub fn finish(mut self) -> Result<Run> {
        self.closed = true;
        self.tracker.end_run(&self.run_id, RunStatus::Completed)
    }
}

impl<B: TrackingBackend> Drop for TrackedRun<'_, B> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(run_id = %self.run_id, "Run dropped before completion, marking failed");
        if let Err(e) = self.tracker.end_run(&self.run_id, RunStatus::Failed) {
            warn!(run_id = %self.run_id, error = %e, "Failed to close tracking run");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::storage::InMemoryBackend;
    use super::*;

    #[test]
    fn test_run_lifecycle() {
        let mut tracker = ExperimentTracker::new("exp", InMemoryBackend::new());
        tracker.add_tag("team", "maintenance");

        let id = tracker.start_run(Some("baseline")).unwrap();
        tracker.log_param(&id, "lr", "0.001").unwrap();
        tracker.log_metric(&id, "loss", 0.7, 1).unwrap();
        tracker.log_metric(&id, "loss", 0.5, 2).unwrap();
        tracker.log_artifact(&id, "lstm_model.json").unwrap();

        let active = tracker.get_run(&id).unwrap();
        assert_eq!(active.status, RunStatus::Active);

        let done = tracker.end_run(&id, RunStatus::Completed).unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        assert!(done.ended_at.is_some());
        assert_eq!(done.params["lr"], "0.001");
        assert_eq!(done.last_metric("loss"), Some(0.5));
        assert_eq!(done.tags["team"], "maintenance");

        let stored = tracker.get_run(&id).unwrap();
        assert_eq!(stored, done);
    }

    #[test]
    fn test_logging_to_ended_run_fails() {
        let mut tracker = ExperimentTracker::new("exp", InMemoryBackend::new());
        let id = tracker.start_run(None).unwrap();
        tracker.end_run(&id, RunStatus::Completed).unwrap();

        assert!(matches!(
            tracker.log_param(&id, "k", "v"),
            Err(TrackingError::RunNotActive(_))
        ));
        assert!(matches!(
            tracker.end_run(&id, RunStatus::Failed),
            Err(TrackingError::RunNotFound(_))
        ));
    }

    #[test]
    fn test_guard_finish_completes_run() {
        let mut tracker = ExperimentTracker::new("exp", InMemoryBackend::new());
        let run_id = {
            let mut run = tracker.begin(Some("ok")).unwrap();
            run.log_param("epochs", 3).unwrap();
            let record = run.finish().unwrap();
            assert_eq!(record.params["epochs"], "3");
            record.run_id
        };
        assert_eq!(tracker.get_run(&run_id).unwrap().status, RunStatus::Completed);
    }

    #[test]
    fn test_guard_drop_marks_failed() {
        let mut tracker = ExperimentTracker::new("exp", InMemoryBackend::new());

        fn failing_job<B: TrackingBackend>(
            tracker: &mut ExperimentTracker<B>,
        ) -> std::result::Result<(), String> {
            let mut run = tracker.begin(Some("doomed")).map_err(|e| e.to_string())?;
            run.log_metric("loss", 1.0, 1).map_err(|e| e.to_string())?;
            Err("boom".to_string())
        }

        assert!(failing_job(&mut tracker).is_err());

        let runs = tracker.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert_eq!(runs[0].last_metric("loss"), Some(1.0));
    }

    #[test]
    fn test_run_ids_are_unique() {
        let mut tracker = ExperimentTracker::new("exp", InMemoryBackend::new());
        let a = tracker.start_run(None).unwrap();
        let b = tracker.start_run(None).unwrap();
        assert_ne!(a, b);
        assert_eq!(tracker.list_runs().unwrap().len(), 2);
    }
}
