//! Model Retraining
//!
//! Fits a fresh LSTM classifier on a sensor CSV against placeholder targets,
//! writes the artifact and records the run under `tracking.dir`.
//!
//! Usage:
//!   cargo run --bin predmaint-retrain
//!   cargo run --bin predmaint-retrain -- --csv data/sensors_data.csv --epochs 10

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use predmaint::dataset::SensorTable;
use predmaint::retraining::RetrainingJob;
use predmaint::tracking::storage::JsonFileBackend;
use predmaint::tracking::ExperimentTracker;
use predmaint::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "predmaint-retrain")]
#[command(about = "Retrain the LSTM failure classifier on a sensor log")]
#[command(version)]
struct Args {
    /// Path to a TOML config file (overrides the search order)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Sensor CSV (overrides data.csv_path)
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Artifact output path (overrides model.artifact_path)
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load_or_search(args.config.as_deref())?;
    if let Some(path) = args.csv {
        config.data.csv_path = path;
    }
    if let Some(path) = args.model {
        config.model.artifact_path = path;
    }
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        config.training.batch_size = batch_size;
    }
    if let Some(seed) = args.seed {
        config.training.seed = seed;
    }
    config.validate()?;

    let table = SensorTable::load(&config.data.csv_path, &config.data.feature_columns)
        .with_context(|| {
            format!("Failed to read sensor data from {}", config.data.csv_path.display())
        })?;

    let mut tracker = ExperimentTracker::new(
        config.tracking.experiment.clone(),
        JsonFileBackend::new(&config.tracking.dir),
    );
    tracker.add_tag("data", config.data.csv_path.display().to_string());
    let report = RetrainingJob::from_config(&config)
        .run(&table, &mut tracker)
        .context("Retraining failed")?;

    println!(
        "Model saved to {} (run {}, {} rows, final loss {})",
        report.artifact_path.display(),
        report.run_id,
        report.rows,
        report
            .final_loss()
            .map_or_else(|| "n/a".to_string(), |l| format!("{l:.6}")),
    );
    Ok(())
}
