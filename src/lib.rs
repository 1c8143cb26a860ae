//! predmaint: Predictive Maintenance
//!
//! An LSTM failure classifier behind three independent pipelines that share
//! only the model artifact and the sensor CSV.
//!
//! ## Architecture
//!
//! - **Form**: six raw readings → feature vector → model → `Failure`/`Normal`
//! - **Monitoring**: replay a sensor log and report the mean squared error
//! - **Retraining**: fit a fresh LSTM on a sensor log and write the artifact,
//!   inside one tracked experiment run

pub mod api;
pub mod config;
pub mod dataset;
pub mod features;
pub mod form;
pub mod inference;
pub mod lstm;
pub mod monitoring;
pub mod retraining;
pub mod tracking;
pub mod types;

// Re-export configuration
pub use config::{AppConfig, ConfigError};

// Re-export commonly used types
pub use types::{
    MachineType, MaintenanceLabel, Prediction, FAILURE_THRESHOLD, MACHINE_TYPE_CODES,
};

pub use dataset::{DatasetError, SensorTable, SENSOR_COLUMNS};
pub use features::{encode, FeatureVector, FormInput, InputError};
pub use form::{submit, FormOutcome};
pub use inference::{InferenceAdapter, Model, ModelError, SequenceBatch};
pub use lstm::LstmClassifier;
pub use monitoring::{MonitoringLoop, MonitoringReport, PLACEHOLDER_REFERENCE};
pub use retraining::{PlaceholderTargets, RetrainError, RetrainingJob};
