//! Application state, routes and the HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use common::AppConfig;
use ebird_client::BirdData;
use geo_client::{CountyLookup, Geocoder};
use kv_cache::CacheAside;
use tokio::net::TcpListener;
use tracing::info;

use crate::handlers;

/// Prefix the deployed front end calls the functions under.
pub const FUNCTIONS_PREFIX: &str = "/.netlify/functions";

/// Shared by every handler. Clients are built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub bird_data: Arc<dyn BirdData>,
    pub geocoder: Arc<dyn Geocoder>,
    pub counties: Arc<dyn CountyLookup>,
    pub cache: CacheAside,
    pub config: Arc<AppConfig>,
    pub started_at: DateTime<Utc>,
}

fn api_routes() -> Router<AppState> {
    // The front end requests some functions with a trailing slash.
    Router::new()
        .route("/hotspots", get(handlers::hotspots))
        .route("/hotspots/", get(handlers::hotspots))
        .route("/observations", get(handlers::observations))
        .route("/observations/", get(handlers::observations))
        .route("/geocoding", get(handlers::geocoding))
        .route("/geocoding/", get(handlers::geocoding))
        .route("/county", get(handlers::county))
        .route("/county/", get(handlers::county))
        .route("/health", get(handlers::health))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(api_routes())
        .nest(FUNCTIONS_PREFIX, api_routes())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server.bind_addr, state.config.server.port
    )
    .parse()?;

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Bird Hotspot listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
