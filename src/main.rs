//! predmaint - Predictive Maintenance Form
//!
//! Serves the prediction form (default) or scores a single form submission
//! from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Serve the form on server.addr (default 127.0.0.1:8080)
//! predmaint
//! predmaint serve --addr 0.0.0.0:9000
//!
//! # One-shot prediction
//! predmaint predict --machine-type L --air-temperature 300 --process-temperature 310 \
//!     --rotational-speed 1500 --torque 40 --tool-wear 10
//! ```
//!
//! # Environment Variables
//!
//! - `PREDMAINT_CONFIG`: Path to a TOML config file
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use predmaint::api::{create_app, AppState};
use predmaint::features::{FormInput, FORM_FEATURE_WIDTH};
use predmaint::form::submit;
use predmaint::{AppConfig, InferenceAdapter};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "predmaint")]
#[command(about = "Predictive maintenance failure classifier")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides the search order)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Model artifact to load (overrides model.artifact_path)
    #[arg(long, global = true, value_name = "PATH")]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Serve the prediction form over HTTP (default)
    Serve {
        /// Override the server address
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Score one set of readings and print the result
    Predict {
        /// Machine type: L, M or H
        #[arg(long, default_value = "L")]
        machine_type: String,
        #[arg(long)]
        air_temperature: String,
        /// Process temperature (K)
        #[arg(long)]
        process_temperature: String,
        /// Rotational speed [rpm]
        #[arg(long)]
        rotational_speed: String,
        /// Torque [Nm]
        #[arg(long)]
        torque: String,
        /// Tool wear [min]
        #[arg(long)]
        tool_wear: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = AppConfig::load_or_search(args.config.as_deref())?;
    let artifact_path = args.model.unwrap_or_else(|| config.model.artifact_path.clone());

    // The model is required by both commands; a load failure is fatal.
    let adapter = InferenceAdapter::load(&artifact_path)
        .with_context(|| format!("Failed to load model from {}", artifact_path.display()))?;
    if adapter.input_width() != FORM_FEATURE_WIDTH {
        warn!(
            model_width = adapter.input_width(),
            form_width = FORM_FEATURE_WIDTH,
            "Model input width does not match the form; every prediction will fail"
        );
    }

    match args.command.unwrap_or(SubCommand::Serve { addr: None }) {
        SubCommand::Serve { addr } => {
            let addr = addr.unwrap_or(config.server.addr);
            serve(adapter, artifact_path, &addr).await
        }
        SubCommand::Predict {
            machine_type,
            air_temperature,
            process_temperature,
            rotational_speed,
            torque,
            tool_wear,
        } => {
            let input = FormInput {
                machine_type,
                air_temperature,
                process_temperature,
                rotational_speed,
                torque,
                tool_wear,
            };
            let outcome = submit(&input, &adapter);
            println!("{}: {}", outcome.title(), outcome.message());
            if outcome.is_error() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Serve the form until Ctrl-C.
async fn serve(adapter: InferenceAdapter, artifact_path: PathBuf, addr: &str) -> Result<()> {
    let state = AppState::new(adapter).with_artifact_path(artifact_path);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);
    info!("Form available at: http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Received shutdown signal");
        })
        .await
        .context("HTTP server error")?;

    info!("Graceful shutdown complete");
    Ok(())
}
