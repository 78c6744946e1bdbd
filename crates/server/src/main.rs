//! Gallery server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use gallery_core::config::AppConfig;
use gallery_server::{AppState, HttpFetcher, StaticTokenVerifier, create_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// galleryd - image gallery upload and reconciliation server
#[derive(Parser, Debug)]
#[command(name = "galleryd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "GALLERY_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

/// Merge the optional config file with `GALLERY_` environment variables.
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(config_path = %path, "No config file found, using defaults and environment");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("GALLERY_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("galleryd v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    gallery_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let storage = gallery_storage::from_config(&config.storage)
        .await
        .context("failed to initialize blob storage")?;
    storage
        .health_check()
        .await
        .context("blob storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Blob storage initialized");

    let index = gallery_index::from_config(&config.index)
        .await
        .context("failed to initialize index store")?;
    index
        .health_check()
        .await
        .context("index store health check failed")?;
    tracing::info!(backend = index.backend_name(), "Index store initialized");

    let fetcher = HttpFetcher::new(config.reconcile.fetch_timeout(), config.upload.max_file_size)
        .context("failed to build HTTP client")?;
    let verifier = StaticTokenVerifier::from_config(&config.auth)
        .context("failed to load auth tokens")?;

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let state = AppState::new(
        config,
        storage,
        index,
        Arc::new(fetcher),
        Arc::new(verifier),
    );
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
