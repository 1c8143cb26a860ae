use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::dataset::SENSOR_COLUMNS;
use crate::lstm::training::FitOptions;
use crate::lstm::DEFAULT_HIDDEN_UNITS;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "PREDMAINT_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "predmaint.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `AppConfig::load()` which searches:
/// 1. `$PREDMAINT_CONFIG` env var
/// 2. `./predmaint.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Where the model artifact lives
    #[serde(default)]
    pub model: ModelConfig,

    /// Sensor log input
    #[serde(default)]
    pub data: DataConfig,

    /// Retraining hyperparameters
    #[serde(default)]
    pub training: TrainingConfig,

    /// Experiment tracking sink
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PREDMAINT_CONFIG` environment variable
    /// 2. `./predmaint.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {CONFIG_ENV_VAR}");
                        return config;
                    }
                    Err(e) => {
                        warn!(
                            path = %p.display(),
                            error = %e,
                            "Failed to load config from {CONFIG_ENV_VAR}, falling back"
                        );
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        // 2. Check ./predmaint.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{LOCAL_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        Self::default()
    }

    /// Load an explicit file if given (errors are returned), otherwise
    /// fall back to the search order.
    pub fn load_or_search(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                let config = Self::load_from_file(p)?;
                info!(path = %p.display(), "Loaded config");
                Ok(config)
            }
            None => Ok(Self::load()),
        }
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check every section and report all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.model.artifact_path.as_os_str().is_empty() {
            errors.push("model.artifact_path must not be empty".to_string());
        }
        if self.data.csv_path.as_os_str().is_empty() {
            errors.push("data.csv_path must not be empty".to_string());
        }
        if self.data.feature_columns.is_empty() {
            errors.push("data.feature_columns must list at least one column".to_string());
        }
        let mut seen = HashSet::new();
        for column in &self.data.feature_columns {
            if column.trim().is_empty() {
                errors.push("data.feature_columns contains an empty name".to_string());
            } else if !seen.insert(column.as_str()) {
                errors.push(format!("data.feature_columns lists {column:?} twice"));
            }
        }

        let t = &self.training;
        if t.epochs == 0 {
            errors.push("training.epochs must be > 0".to_string());
        }
        if t.batch_size == 0 {
            errors.push("training.batch_size must be > 0".to_string());
        }
        if t.hidden_units == 0 {
            errors.push("training.hidden_units must be > 0".to_string());
        }
        if !t.learning_rate.is_finite() || t.learning_rate <= 0.0 {
            errors.push(format!(
                "training.learning_rate must be a positive finite number (got {})",
                t.learning_rate
            ));
        }

        if self.tracking.dir.as_os_str().is_empty() {
            errors.push("tracking.dir must not be empty".to_string());
        }
        if self.tracking.experiment.trim().is_empty() {
            errors.push("tracking.experiment must not be empty".to_string());
        }
        if self.server.addr.trim().is_empty() {
            errors.push("server.addr must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Artifact written by retraining and read by inference/monitoring
    pub artifact_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("lstm_model.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    pub csv_path: PathBuf,
    /// Columns fed to the model, in model order
    pub feature_columns: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("sensors_data.csv"),
            feature_columns: SENSOR_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub hidden_units: usize,
    pub learning_rate: f64,
    /// Seeds weight init, shuffling and placeholder targets
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let fit = FitOptions::default();
        Self {
            epochs: fit.epochs,
            batch_size: fit.batch_size,
            hidden_units: DEFAULT_HIDDEN_UNITS,
            learning_rate: fit.learning_rate,
            seed: fit.seed,
        }
    }
}

impl TrainingConfig {
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    /// Directory holding one JSON file per run
    pub dir: PathBuf,
    pub experiment: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("mlruns"),
            experiment: "predictive-maintenance".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.artifact_path, PathBuf::from("lstm_model.json"));
        assert_eq!(config.data.feature_columns.len(), 5);
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.training.batch_size, 16);
        assert_eq!(config.training.hidden_units, 64);
        assert_eq!(config.server.addr, "127.0.0.1:8080");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [training]
            epochs = 10

            [data]
            csv_path = "logs/machines.csv"
            "#,
        )
        .unwrap();
        assert_eq!(config.training.epochs, 10);
        assert_eq!(config.training.batch_size, 16);
        assert_eq!(config.data.csv_path, PathBuf::from("logs/machines.csv"));
        assert_eq!(config.data.feature_columns[0], "Rotational_speed");
        assert_eq!(config.tracking.dir, PathBuf::from("mlruns"));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = AppConfig::default();
        config.training.epochs = 0;
        config.training.learning_rate = f64::NAN;
        config.data.feature_columns = vec!["Torque".into(), "Torque".into()];

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 3, "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("epochs")));
                assert!(errors.iter().any(|e| e.contains("learning_rate")));
                assert!(errors.iter().any(|e| e.contains("twice")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predmaint.toml");
        std::fs::write(&path, "[training\nepochs = 1").unwrap();
        match AppConfig::load_from_file(&path) {
            Err(ConfigError::Parse(p, _)) => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_fit_options_follow_training_section() {
        let mut config = AppConfig::default();
        config.training.seed = 9;
        config.training.learning_rate = 0.01;
        let fit = config.training.fit_options();
        assert_eq!(fit.seed, 9);
        assert_eq!(fit.learning_rate, 0.01);
        assert_eq!(fit.epochs, 3);
    }
}
