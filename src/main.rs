use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use parcel_api::auth::{Authorizer, JwksCache};
use parcel_api::config::AppConfig;
use parcel_api::database::{DatabaseManager, PgParcelStore};
use parcel_api::{app, AppState};

#[derive(Parser)]
#[command(name = "parcel-api", version, about = "Serve parcel records over HTTP")]
struct Cli {
    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (overrides PARCEL_API_PORT / PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL and the Cognito settings
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!("Starting Parcel API in {:?} mode", config.environment);

    let db = DatabaseManager::connect(&config.database)
        .await
        .context("failed to create database pool")?;

    let keys = JwksCache::remote(
        config.auth.jwks_url()?,
        Duration::from_secs(config.auth.jwks_fetch_timeout_secs),
        Duration::from_secs(config.auth.jwks_refresh_cooldown_secs),
    )
    .context("failed to build key set client")?;

    // Without keys every caller is a guest until the next refresh succeeds
    if let Err(e) = keys.refresh().await {
        tracing::warn!("Signing keys unavailable at startup: {}", e);
    }

    let issuer = config.auth.issuer();
    let authorizer = Authorizer::new(keys, &config.auth.client_id, Some(&issuer));
    let state = AppState::new(
        Arc::new(PgParcelStore::new(db.clone())),
        Arc::new(authorizer),
    );
    let router = app(state, &config.api.cors_origins);

    let port = cli.port.unwrap_or(config.api.port);
    let bind_addr = format!("{}:{}", cli.host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Parcel API listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutdown signal received");
}
