//! Bird Hotspot: proxy service for the birding hotspot map.
//!
//! Single-binary Tokio application that:
//! 1. Serves eBird hotspots per county region, cache-aside
//! 2. Serves recent observations per hotspot, cache-aside
//! 3. Forwards place searches to the configured geocoder
//! 4. Resolves coordinates to US counties

mod config;
mod error;
mod handlers;
mod server;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ebird_client::EbirdClient;
use geo_client::FccCountyClient;
use kv_cache::{CacheAside, KvStore};

use crate::server::AppState;

const DEFAULT_LOG_FILTER: &str =
    "bird_hotspot=info,ebird_client=info,geo_client=info,kv_cache=info,viewport=info";

const CHECK_TTL: Duration = Duration::from_secs(60);

/// Bird Hotspot proxy server
#[derive(Parser)]
#[command(name = "bird-hotspot", about = "eBird hotspot, observation and geocoding proxy")]
struct Cli {
    /// Write and read back a test key in the configured cache, then exit.
    #[arg(long)]
    check_cache: bool,

    /// Print the effective configuration (secrets redacted) and exit.
    #[arg(long)]
    print_config: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Round-trip a test value through the store.
async fn check_cache(store: Arc<dyn KvStore>) -> anyhow::Result<()> {
    let key = format!("bird-hotspot-check-{}", Utc::now().timestamp_millis());
    let value = Utc::now().to_rfc3339();

    store
        .set(&key, &value, CHECK_TTL)
        .await
        .with_context(|| format!("{} cache write failed", store.backend_name()))?;
    let read = store
        .get(&key)
        .await
        .with_context(|| format!("{} cache read failed", store.backend_name()))?;

    match read {
        Some(read) if read == value => {
            info!("✅ {} cache OK (key {})", store.backend_name(), key);
            Ok(())
        }
        Some(read) => anyhow::bail!("cache check mismatch: wrote {value:?}, read {read:?}"),
        None if store.backend_name() == "disabled" => {
            warn!("Cache is disabled; every request goes upstream");
            Ok(())
        }
        None => anyhow::bail!("check key {key} was not readable after write"),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_config().context("Configuration error")?;

    if cli.print_config {
        println!("{}", config::redacted_toml(&cfg)?);
        return Ok(());
    }

    let store = kv_cache::store_from_config(&cfg.cache).context("Failed to set up cache")?;
    info!("Cache backend: {}", store.backend_name());

    if cli.check_cache {
        return check_cache(store).await;
    }

    let bird_data = Arc::new(EbirdClient::new(&cfg.ebird).context("Failed to build eBird client")?);
    let geocoder =
        geo_client::geocoder_from_config(&cfg.geocoding).context("Failed to build geocoder")?;
    let counties = Arc::new(
        FccCountyClient::new(&cfg.geocoding).context("Failed to build county lookup client")?,
    );

    info!(
        "eBird: {} ({} req/s, default back={}d)",
        cfg.ebird.base_url, cfg.ebird.requests_per_sec, cfg.ebird.default_back_days
    );
    info!("Geocoding: {}", geocoder.provider_name());
    info!(
        "Cache TTLs: hotspots={}s, observations={}s, empty={}s",
        cfg.cache.hotspot_ttl_secs, cfg.cache.observation_ttl_secs, cfg.cache.empty_ttl_secs
    );

    let state = AppState {
        bird_data,
        geocoder,
        counties,
        cache: CacheAside::new(store),
        config: Arc::new(cfg),
        started_at: Utc::now(),
    };

    server::serve(state).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    info!("🐦 Bird Hotspot starting up...");

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
