use anyhow::{Context, Result};
use pmx_unisphere::throttle::{RequestThrottle, ThrottledClient, MAX_CONCURRENT_REQUESTS};
use pmx_unisphere::unisphere::UnisphereClient;
use pmx_unisphere::ApiClient;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use pmx_exporter::app;
use pmx_exporter::config::ExporterConfig;
use pmx_exporter::state::AppState;

const DEFAULT_CONFIG_PATH: &str = "config/exporter.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  pmx-exporter [config.toml]    Start the exporter (default: {DEFAULT_CONFIG_PATH})");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pmx=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        path => run_exporter(path.unwrap_or(DEFAULT_CONFIG_PATH)).await,
    }
}

async fn run_exporter(config_path: &str) -> Result<()> {
    let config = ExporterConfig::load(config_path)?;

    tracing::info!(
        address = %config.unisphere.address,
        user = %config.unisphere.user,
        symm_id = %config.unisphere.symm_id,
        target_type = %config.exporter.target,
        port = config.exporter.port,
        "pmx-exporter starting"
    );

    let unisphere = UnisphereClient::new(&config.client_settings())
        .context("Failed to create Unisphere client")?;
    let throttle = Arc::new(RequestThrottle::new(MAX_CONCURRENT_REQUESTS));
    let client: Arc<dyn ApiClient> =
        Arc::new(ThrottledClient::new(Arc::new(unisphere), Arc::clone(&throttle)));

    let state = AppState::bootstrap(&config, client).await?;
    let http_app = app::build_http_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.exporter.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(http = %addr, "Exporter listening");

    axum::serve(listener, http_app)
        .with_graceful_shutdown(async move {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
            // Scrapes still in flight stop issuing upstream requests.
            throttle.close();
        })
        .await
        .context("HTTP server error")?;

    tracing::info!("Exporter stopped");
    Ok(())
}
