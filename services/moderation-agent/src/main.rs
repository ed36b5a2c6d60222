//! AT Protocol Moderation Agent
//!
//! Single-binary Rust service that:
//! 1. Loads YAML configuration and establishes a PDS session
//! 2. Runs the embed checker / redirect follower / action router pipeline
//! 3. Exposes `/health` and `/metrics` for operators

mod config;
mod metrics;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use engine::{AccountEventCache, Engine, EngineConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use moderation_client::{Client, ClientConfig};
use session::Credentials;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Shared application state accessible from all handlers. Only the
/// account cache is shared with the engine, not the engine itself — the
/// engine stays owned by `main` so its worker handles can be awaited
/// directly during shutdown, no `Arc::try_unwrap` dance required.
#[derive(Clone)]
struct AppState {
    client: Arc<Client>,
    accounts: Arc<AccountEventCache>,
    metrics: PrometheusHandle,
    started_at: Instant,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.observability.log_level)
                .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting moderation-agent");

    let prometheus_handle = metrics::install_recorder();

    info!(
        host = %config.pds.host,
        handle = %config.pds.handle,
        dry_run = config.pds.dry_run,
        number_of_threads = config.engine.number_of_threads,
        "configuration loaded"
    );

    let client = Arc::new(Client::new(
        reqwest::Client::new(),
        ClientConfig {
            base_url: config.pds.base_url(),
            service_did: config.pds.service_did.clone(),
            operator_did: config.pds.operator_did.clone(),
            credentials: Credentials {
                identifier: config.pds.handle.clone(),
                password: config.pds.password.clone(),
            },
            refresh_buffer: config.pds.refresh_buffer(),
            use_token: config.pds.use_token,
        },
    ));

    client
        .connect()
        .await
        .context("failed to establish initial PDS session")?;
    info!("PDS session established");

    let engine_config: EngineConfig = config.engine.into_engine_config(config.pds.dry_run);
    let engine = Engine::start(Arc::new(engine_config), client.clone());
    let accounts = engine.accounts.clone();

    let metrics_addr = config.observability.metrics_addr;
    let app_state = AppState {
        client,
        accounts,
        metrics: prometheus_handle,
        started_at: Instant::now(),
    };

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(app_state.clone());

    let listener = TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("failed to bind to {metrics_addr}"))?;

    info!(addr = %metrics_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down engine, draining in-flight work");
    engine.shutdown().await;

    info!("shutdown complete");
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": uptime,
        "session_ready": state.client.is_ready(),
        "queue_depths": {
            "accounts_cached": state.accounts.len(),
        },
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
