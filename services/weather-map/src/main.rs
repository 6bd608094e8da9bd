//! Weather map session service.
//!
//! Runs one map session against the National Weather Service and radar
//! providers:
//! - Staggered loading of forecast, alert and radar layers
//! - Alert impact detection for the configured forecast locations
//! - Periodic refresh of alerts and retry of failed locations
//! - HTTP control surface for layer commands, pointer events and the info panel

mod config;
mod refresh;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use config::AppConfig;
use layer_engine::{HeadlessMap, InfoPanelState, MapSession};
use map_common::LayerKind;
use nws_client::{GeoDataGateway, NwsClient};
use server::{AppState, Session};

#[derive(Parser, Debug)]
#[command(name = "weather-map")]
#[command(about = "Weather map session with forecast, alert and radar layers")]
struct Args {
    /// Configuration file
    #[arg(long, env = "CONFIG_FILE", default_value = "config/weather-map.yaml")]
    config: PathBuf,

    /// Port for the control HTTP server
    #[arg(long, env = "STATUS_PORT", default_value = "8090")]
    port: u16,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run one load cycle, print a summary and exit
    #[arg(long)]
    once: bool,

    /// Disable the control HTTP server
    #[arg(long)]
    no_server: bool,

    /// Override the NWS API root from the config file
    #[arg(long, env = "WEATHER_API_URL")]
    weather_api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    let mut config = AppConfig::load(&args.config)?;
    if let Some(url) = args.weather_api_url {
        config.gateway.weather_api_url = url;
    }

    info!(
        api = %config.gateway.weather_api_url,
        locations = config.locations.len(),
        "Starting weather map session"
    );

    let gateway: Arc<dyn GeoDataGateway> = Arc::new(NwsClient::new(config.gateway.clone())?);
    let session: Session = MapSession::new(
        gateway,
        HeadlessMap::new(),
        Arc::new(InfoPanelState::new()),
        config.session_config(),
    );

    if args.once {
        info!("Running single load cycle");
        session.load_layers().await;
        log_summary(&session);
        session.teardown();
        return Ok(());
    }

    let state = Arc::new(AppState {
        session: session.clone(),
        metrics: Some(prometheus_handle),
    });

    if !args.no_server {
        let port = args.port;
        tokio::spawn(async move {
            if let Err(e) = server::run_server(state, port).await {
                error!(error = %e, "Control server failed");
            }
        });
    }

    let loading = {
        let session = session.clone();
        tokio::spawn(async move { session.load_layers().await })
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx_clone.send(()).ok();
    });

    refresh::run_forever(session.clone(), config.refresh.interval(), shutdown_tx.subscribe()).await;

    session.teardown();
    if !loading.is_finished() {
        info!("Initial load still running, results will be discarded");
    }
    log_summary(&session);

    Ok(())
}

fn log_summary(session: &Session) {
    let (forecasts, events, impacted) = session.with_registry(|r| {
        (r.forecast_count(), r.event_names().len(), r.impacted_count())
    });
    let radars = session
        .store()
        .descriptors(LayerKind::Radar)
        .into_iter()
        .map(|d| d.name)
        .collect::<Vec<_>>();
    info!(
        forecast_layers = forecasts,
        event_layers = events,
        impacted_records = impacted,
        radars = ?radars,
        "Session summary"
    );
}
