use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod resolver;
mod service;
mod storage;
mod validate;

use config::{CliArgs, Config};
use resolver::SystemResolver;
use service::LookupService;
use storage::LookupStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();

    // Load config from file if provided, otherwise use defaults.
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(Path::new(config_path))?
    } else {
        Config::default()
    };
    config.merge_env();
    config.merge_cli(&cli);

    // Logging.
    let filter = if config.quiet {
        "error".to_string()
    } else if config.debug {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into())
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── Storage & Service ─────────────────────────────────────────────
    let store = LookupStore::open(&config.db_path)?;
    tracing::info!("lookup store opened at {}", config.db_path);

    let metrics = Arc::new(api::Metrics::new());
    let service = LookupService::new(Arc::new(SystemResolver), store)
        .with_observer(metrics.clone());

    // ── HTTP API ──────────────────────────────────────────────────────
    let app_state = Arc::new(api::AppState {
        service: Arc::new(service),
    });
    let app = api::router(app_state, metrics);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    tracing::info!("Server running on http://{}:{}", config.host, config.port);
    axum::serve(listener, app).await?;

    Ok(())
}
