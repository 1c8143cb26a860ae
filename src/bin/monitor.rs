//! Sensor Log Monitoring
//!
//! Replays a sensor CSV through the trained model and prints the mean
//! squared prediction error against the placeholder reference.
//!
//! Usage:
//!   cargo run --bin predmaint-monitor
//!   cargo run --bin predmaint-monitor -- --csv data/sensors_data.csv --model lstm_model.json

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use predmaint::dataset::SensorTable;
use predmaint::monitoring::MonitoringLoop;
use predmaint::{AppConfig, InferenceAdapter};

#[derive(Parser, Debug)]
#[command(name = "predmaint-monitor")]
#[command(about = "Replay a sensor log through the model and report the mean squared error")]
#[command(version)]
struct Args {
    /// Path to a TOML config file (overrides the search order)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Sensor CSV (overrides data.csv_path)
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Model artifact (overrides model.artifact_path)
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,
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
    let config = AppConfig::load_or_search(args.config.as_deref())?;
    let csv_path = args.csv.unwrap_or(config.data.csv_path);
    let model_path = args.model.unwrap_or(config.model.artifact_path);

    let adapter = InferenceAdapter::load(&model_path)
        .with_context(|| format!("Failed to load model from {}", model_path.display()))?;
    let table = SensorTable::load(&csv_path, &config.data.feature_columns)
        .with_context(|| format!("Failed to read sensor data from {}", csv_path.display()))?;

    let report = MonitoringLoop::new(&adapter)
        .run(&table)
        .context("Monitoring pass failed")?;

    info!(
        rows = report.rows_total,
        processed = report.rows_processed,
        "Monitoring complete"
    );
    println!("{report}");
    if let (Some(std_dev), Some(max)) = (report.series.std_dev(), report.series.max()) {
        println!("Error spread: std dev {std_dev}, max {max}");
    }
    Ok(())
}
