//! Case map - console driver for the case map engine
//!
//! Loads the entity manifest, fetches the requested date from the data
//! service and then reads UI events from stdin, one per line:
//! a date (`2020-3-15`), `hover|leave|select <kind> <name>`, `legend`, `quit`.
//! Every style application and notice is written to the log.

use case_map::domain::types::CaseDate;
use case_map::infra::{Config, SyncMetrics};
use case_map::io::console::spawn_stdin_reader;
use case_map::io::geometry::load_registry;
use case_map::io::{HttpDataService, TracingDateControl, TracingMapHost};
use case_map::services::{MapContext, MapEvent, SyncController};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Case map - per-date case counts bound onto regions and facilities
#[derive(Parser, Debug)]
#[command(name = "case-map", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE or config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Initial date to load, YYYY-M-D (default: today)
    #[arg(short, long)]
    date: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default: INFO, use RUST_LOG=debug to see every style application
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("case-map starting");

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(&std::env::args().collect::<Vec<_>>()),
    };

    info!(
        config_file = %config.config_file(),
        data_service_url = %config.data_service_url(),
        timeout_ms = %config.data_service_timeout_ms(),
        geometry_file = %config.geometry_file(),
        region_buckets = %config.region_layer().buckets.buckets().len(),
        facility_buckets = %config.facility_layer().buckets.buckets().len(),
        "config_loaded"
    );

    let registry = load_registry(config.geometry_file())?;
    let context = MapContext::new(registry, config.binding_engine(), config.highlight().clone());
    let service = Arc::new(HttpDataService::new(config.data_service_url(), config.data_service_timeout())?);
    let metrics = Arc::new(SyncMetrics::new());

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Create event channel (bounded for backpressure)
    let (event_tx, event_rx) = mpsc::channel(1000);

    // Initial date goes first so it is requested before any console input
    let initial = args.date.unwrap_or_else(|| CaseDate::today().to_string());
    event_tx.send(MapEvent::DateInput(initial)).await?;

    // Reader thread is never joined
    spawn_stdin_reader(event_tx)?;

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let mut controller = SyncController::new(context, service, metrics.clone());
    let mut host = TracingMapHost::new();
    let mut date_control = TracingDateControl;
    info!("sync_controller_started");

    // Runs until stdin ends (or `quit`) and the last fetch settles, or Ctrl+C
    controller.run(event_rx, shutdown_rx, &mut host, &mut date_control).await;

    metrics.report().log();
    info!(styles_applied = %host.applied(), "case-map shutdown complete");
    Ok(())
}
