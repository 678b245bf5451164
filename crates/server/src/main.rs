//! Silo server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use silo_core::config::AppConfig;
use silo_server::{AppState, create_router};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Silo - a resumable chunked upload service for large artifacts
#[derive(Parser, Debug)]
#[command(name = "silod")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SILO_CONFIG", default_value = "config/server.toml")]
    config: String,
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

    tracing::info!("Silo v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration: optional TOML file, overridden by SILO_* env vars.
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::info!("No config file at {}, using defaults and environment", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("SILO_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    silo_server::metrics::register_metrics();

    // Initialize and verify both backing stores before accepting traffic.
    let storage = silo_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend ready");

    let metadata = silo_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata health check failed")?;
    tracing::info!("Metadata store ready");

    let state = AppState::new(config.clone(), storage, metadata);

    spawn_expiry_sweep(&state);

    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!("Listening on {}", addr);

    let grace = Duration::from_secs(config.server.shutdown_grace_secs);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(grace))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Spawn the background expiry sweep loop.
fn spawn_expiry_sweep(state: &AppState) {
    let uploads = state.uploads.clone();
    let interval = state.config.upload.expiry_sweep_interval();

    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Expiry sweep started");
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately, catching sessions that expired
        // while the server was down.
        loop {
            ticker.tick().await;
            match uploads.sweep_expired(time::OffsetDateTime::now_utc()).await {
                Ok(0) => {}
                Ok(swept) => {
                    silo_server::metrics::SESSIONS_EXPIRED.inc_by(swept);
                    tracing::info!(swept, "expiry sweep failed expired sessions");
                }
                Err(err) => {
                    tracing::error!(error = %err, "expiry sweep failed");
                }
            }
        }
    });
}

/// Resolve on SIGINT/SIGTERM; arm a hard-exit watchdog for stuck shutdowns.
async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!(
        grace_secs = grace.as_secs(),
        "Shutdown signal received, draining in-flight requests"
    );

    // If draining hangs past the grace period, exit anyway.
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        tracing::error!("Shutdown grace period exceeded, exiting");
        std::process::exit(1);
    });
}
