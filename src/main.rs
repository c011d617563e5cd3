use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use fleet_maintenance::{
    Config, CsvSnapshotSource, FsModelRepo, MaintenanceEngine, ScheduleTable, SnapshotSource,
    VehicleSnapshot,
};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fleet-maint", version, about = "Fleet maintenance prediction engine")]
struct Cli {
    /// CSV export of the fleet vehicle table
    #[arg(long, global = true, env = "FLEET_MAINT_SNAPSHOTS")]
    snapshots: Option<PathBuf>,

    /// Directory holding trained model artifacts
    #[arg(long, global = true, env = "FLEET_MAINT_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Train once before running the command if no model is loaded
    #[arg(long, global = true)]
    auto_train: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Predict the next maintenance for every active vehicle
    PredictAll,
    /// Predict the next maintenance for one vehicle
    Predict {
        #[arg(long)]
        vehicle_id: u64,
    },
    /// Train the regression model on the current fleet
    Train,
    /// Show whether a model is loaded and its last statistics
    Status,
    /// Show the last training statistics
    Stats,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_maintenance=info,fleet_maint=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load().context("loading configuration")?;
    if let Some(path) = cli.snapshots {
        config.storage.snapshots_path = path;
    }
    if let Some(dir) = cli.model_dir {
        config.storage.model_dir = dir;
    }

    let today = Local::now().date_naive();
    let source = CsvSnapshotSource::new(&config.storage.snapshots_path);
    let engine = MaintenanceEngine::open(
        ScheduleTable::standard(),
        &config.engine,
        Box::new(FsModelRepo::new(&config.storage.model_dir)),
    );

    if cli.auto_train && !engine.is_trained() {
        tracing::info!("No model loaded, training on startup");
        match fetch(&source, today) {
            Ok(snapshots) => {
                let result = engine.train(&snapshots);
                if !result.success {
                    tracing::warn!(message = ?result.message, "Startup training failed");
                }
            }
            Err(message) => tracing::warn!(%message, "Startup training skipped"),
        }
    }

    let ok = match cli.command {
        Command::PredictAll => match fetch(&source, today) {
            Ok(snapshots) => {
                let response = engine.predict_all(&snapshots, today);
                emit(&response)?;
                response.success
            }
            Err(message) => failure(message)?,
        },
        Command::Predict { vehicle_id } => match fetch(&source, today) {
            Ok(snapshots) => match engine.predict_one(vehicle_id, &snapshots, today) {
                Ok(prediction) => {
                    emit(&json!({ "success": true, "data": prediction }))?;
                    true
                }
                Err(e) => failure(e.to_string())?,
            },
            Err(message) => failure(message)?,
        },
        Command::Train => match fetch(&source, today) {
            Ok(snapshots) => {
                let response = engine.train(&snapshots);
                emit(&response)?;
                response.success
            }
            Err(message) => failure(message)?,
        },
        Command::Status => {
            emit(&json!({ "success": true, "data": engine.status() }))?;
            true
        }
        Command::Stats => {
            let stats = engine.current_model().map(|b| b.stats.clone());
            emit(&json!({ "success": true, "data": stats }))?;
            true
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn fetch(source: &CsvSnapshotSource, today: NaiveDate) -> Result<Vec<VehicleSnapshot>, String> {
    source
        .fetch_vehicle_snapshots(today)
        .map_err(|e| format!("Error reading {}: {}", source.path().display(), e))
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn failure(message: String) -> anyhow::Result<bool> {
    emit(&json!({ "success": false, "message": message }))?;
    Ok(false)
}
