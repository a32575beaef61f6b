//! Risk & Moderation Engine — Binary Entrypoint
//! Boots the Axum HTTP server, wiring routes, shared state, and middleware.
//!
//! The binary runs against the in-memory store; real deployments plug a
//! relational store behind the `RiskStore` trait.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use veilleur::api::{self, AppState};
use veilleur::completion::build_client_from_env;
use veilleur::config::EngineConfig;
use veilleur::metrics::Metrics;
use veilleur::store::MemoryStore;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("veilleur=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = EngineConfig::load()?;
    let metrics = Metrics::init(config.alerts.cooldown_secs);

    // Completion timeout also bounds how long a check-in request may hang
    // on the external classifier before failing with 500.
    let completion = build_client_from_env(Duration::from_secs(10));
    tracing::info!(provider = completion.provider_name(), "completion client ready");

    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config, store, completion);
    let app = api::router(state).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(%port, "veilleur listening");
    axum::serve(listener, app).await?;
    Ok(())
}
