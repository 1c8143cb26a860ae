//! Application Configuration Module
//!
//! TOML configuration shared by the form server, the monitoring loop and the
//! retraining job. Every section is optional; missing keys take built-in
//! defaults.
//!
//! ## Loading Order
//!
//! 1. `PREDMAINT_CONFIG` environment variable (path to TOML file)
//! 2. `predmaint.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The loaded config is passed explicitly to whatever needs it:
//!
//! ```ignore
//! let config = AppConfig::load();
//! let adapter = InferenceAdapter::load(&config.model.artifact_path)?;
//! ```

mod app_config;

pub use app_config::*;
