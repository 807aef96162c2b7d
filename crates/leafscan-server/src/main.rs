//! LeafScan Server
//!
//! Serves plant-leaf disease diagnoses over HTTP.
//!
//! The classifier is loaded once at startup. Without a model artifact the
//! server still starts and answers with simulated predictions (mock mode).

use anyhow::Result;
use clap::Parser;
use leafscan_inference::InferencePipeline;
use leafscan_server::{create_router, AppState, ConfigOverrides, ServerConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "leafscan-server")]
#[command(about = "LeafScan plant disease diagnosis API", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "LEAFSCAN_CONFIG", default_value = "leafscan.yaml")]
    config: PathBuf,

    /// Model artifact (safetensors)
    #[arg(short, long, env = "LEAFSCAN_MODEL_PATH")]
    model_path: Option<PathBuf>,

    /// Listen address
    #[arg(short = 'l', long)]
    listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Persist detections as JSON lines in this directory
    #[arg(short, long)]
    records_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            model_path: self.model_path.clone(),
            listen: self.listen.clone(),
            port: self.port,
            records_dir: self.records_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.json_logs);

    info!("Starting LeafScan server");

    // Load configuration
    let config = ServerConfig::load(&cli.config, &cli.overrides())?;
    info!("Configuration loaded successfully");
    info!("Model artifact: {}", config.inference.model.path.display());
    info!("API prefix: {}", config.api_prefix);

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    // Load the model once; a broken artifact aborts startup
    let inference = config.inference.clone();
    let pipeline =
        tokio::task::spawn_blocking(move || InferencePipeline::from_config(&inference)).await??;
    info!(mode = %pipeline.mode(), "Inference pipeline initialized");

    let store = config.storage.build()?;
    info!(storage = store.name(), "Detection store ready");

    let state = AppState::new(pipeline, store.clone()).with_prometheus(metrics_handle);
    let app = create_router(state, &config);

    let addr: SocketAddr = config.socket_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("LeafScan listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    store.flush().await?;
    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("leafscan=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("leafscan=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    leafscan_telemetry::describe_metrics();

    info!("Metrics exporter initialized");
    Ok(handle)
}
