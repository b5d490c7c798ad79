//! AutomationSrv main program
//!
//! `run` (default) starts the scheduler until SIGINT/SIGTERM, `once` runs a
//! single tick and prints the report, `rules` lists the seeded rules.

use anyhow::{Context, Result};
use automationsrv::app::{build_engine, load_store};
use automationsrv::AutomationConfig;
use clap::{Parser, Subcommand};
use facility_rules::{RecordingSink, TracingSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "AutomationSrv - facility automation rules")]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "AUTOMATION_CONFIG")]
    config: Option<PathBuf>,

    /// Data fixture (overrides data.fixture_path)
    #[arg(short, long, value_name = "FILE")]
    fixture: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the scheduler until shutdown
    Run,
    /// Run one tick and print the outcome as JSON
    Once,
    /// Print the seeded rules
    Rules,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AutomationConfig::load(args.config).context("Failed to load configuration")?;
    let _log_guard = common::logging::init_logging(&config.logging_config())
        .context("Failed to initialise logging")?;

    info!(
        "Starting {} v{}",
        config.service.name,
        env!("CARGO_PKG_VERSION")
    );

    match args.command.unwrap_or(Commands::Run) {
        Commands::Run => run_service(&config, args.fixture).await,
        Commands::Once => run_once(&config, args.fixture).await,
        Commands::Rules => list_rules(&config),
    }
}

async fn run_service(config: &AutomationConfig, fixture: Option<PathBuf>) -> Result<()> {
    let store = load_store(config, fixture)?;
    let engine = Arc::new(build_engine(config, store, Arc::new(TracingSink)));

    let Some(scheduler) = engine.start(config.tick_schedule()) else {
        anyhow::bail!("scheduler failed to start");
    };

    let signal = common::shutdown::wait_for_shutdown().await;
    info!("Received {}, shutting down", signal);

    engine.stop();
    if let Err(e) = scheduler.await {
        error!("Scheduler task ended abnormally: {}", e);
    }

    let status = engine.status();
    info!(
        "Stopped after {} ticks: {} predictive, {} work orders, {} stock, {} escalations",
        status.ticks_completed,
        status.predictive_alerts,
        status.work_orders,
        status.stock_alerts,
        status.escalations
    );
    Ok(())
}

async fn run_once(config: &AutomationConfig, fixture: Option<PathBuf>) -> Result<()> {
    let store = load_store(config, fixture)?;
    let sink = Arc::new(RecordingSink::new());
    let engine = build_engine(config, store, sink.clone());

    let report = engine.tick().await;
    let output = serde_json::json!({
        "report": report,
        "snapshot": engine.snapshot(),
        "notifications": sink.take(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn list_rules(config: &AutomationConfig) -> Result<()> {
    let engine = build_engine(config, Default::default(), Arc::new(TracingSink));
    println!("{}", serde_yaml::to_string(&engine.rules())?);
    Ok(())
}
