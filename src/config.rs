//! Configuration loader: merges .env, config.toml and environment variables.

use common::config::{AppConfig, CacheBackend, GeocodingProvider};
use common::Error;
use std::path::PathBuf;

const CONFIG_PATH_ENV: &str = "BIRD_HOTSPOT_CONFIG";

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_port(raw: &str) -> Result<u16, Error> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| Error::Config("PORT must be an integer in 0..=65535".into()))
}

fn config_path() -> PathBuf {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
        _ => PathBuf::from("config.toml"),
    }
}

/// Apply environment overrides. `lookup` stands in for `std::env::var`.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup("EBIRD_TOKEN") {
        config.ebird.api_token = token.trim().to_string();
    }
    if let Some(token) = lookup("MAPBOX_TOKEN") {
        config.geocoding.mapbox_token = token.trim().to_string();
    }
    if let Some(username) = lookup("GEONAMES_USERNAME") {
        config.geocoding.geonames_username = username.trim().to_string();
    }
    if let Some(url) = lookup("UPSTASH_REDIS_REST_URL") {
        config.cache.upstash_url = url.trim().to_string();
    }
    if let Some(token) = lookup("UPSTASH_REDIS_REST_TOKEN") {
        config.cache.upstash_token = token.trim().to_string();
    }
    if let Some(port) = lookup("PORT") {
        config.server.port = parse_port(&port)?;
    }
    if let Some(addr) = lookup("BIND_ADDR") {
        config.server.bind_addr = addr.trim().to_string();
    }
    if let Some(backend) = lookup("CACHE_BACKEND") {
        config.cache.backend = match backend.trim().to_ascii_lowercase().as_str() {
            "upstash" | "redis" => CacheBackend::Upstash,
            "memory" => CacheBackend::Memory,
            "disabled" | "none" | "off" => CacheBackend::Disabled,
            _ => {
                return Err(Error::Config(
                    "CACHE_BACKEND must be one of: upstash, memory, disabled".into(),
                ));
            }
        };
    }
    if let Some(provider) = lookup("GEOCODING_PROVIDER") {
        config.geocoding.provider = match provider.trim().to_ascii_lowercase().as_str() {
            "mapbox" => GeocodingProvider::Mapbox,
            "geonames" => GeocodingProvider::Geonames,
            _ => {
                return Err(Error::Config(
                    "GEOCODING_PROVIDER must be one of: mapbox, geonames".into(),
                ));
            }
        };
    }
    if let Some(raw) = lookup("HOTSPOT_CACHE_TTL_SECS") {
        config.cache.hotspot_ttl_secs = parse_positive_u64(&raw, "HOTSPOT_CACHE_TTL_SECS")?;
    }
    if let Some(raw) = lookup("OBSERVATION_CACHE_TTL_SECS") {
        config.cache.observation_ttl_secs =
            parse_positive_u64(&raw, "OBSERVATION_CACHE_TTL_SECS")?;
    }
    Ok(())
}

pub fn validate_config(config: &AppConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.server.bind_addr.trim().is_empty() {
        issues.push("server.bind_addr must not be empty".into());
    }

    if config.ebird.api_token.trim().is_empty() {
        issues.push("EBIRD_TOKEN is required (set in .env or environment)".into());
    }
    if config.ebird.base_url.trim().is_empty() {
        issues.push("ebird.base_url must not be empty".into());
    }
    if config.ebird.default_back_days == 0 {
        issues.push("ebird.default_back_days must be > 0".into());
    }
    if config.ebird.max_back_days < config.ebird.default_back_days {
        issues.push("ebird.max_back_days must be >= ebird.default_back_days".into());
    }
    if config.ebird.requests_per_sec == 0 {
        issues.push("ebird.requests_per_sec must be > 0".into());
    }
    if config.ebird.timeout_secs == 0 {
        issues.push("ebird.timeout_secs must be > 0".into());
    }

    match config.geocoding.provider {
        GeocodingProvider::Mapbox if config.geocoding.mapbox_token.trim().is_empty() => {
            issues.push("MAPBOX_TOKEN is required when geocoding.provider = mapbox".into());
        }
        GeocodingProvider::Geonames if config.geocoding.geonames_username.trim().is_empty() => {
            issues.push("GEONAMES_USERNAME is required when geocoding.provider = geonames".into());
        }
        _ => {}
    }
    if config.geocoding.max_query_len == 0 {
        issues.push("geocoding.max_query_len must be > 0".into());
    }
    if config.geocoding.timeout_secs == 0 {
        issues.push("geocoding.timeout_secs must be > 0".into());
    }

    if config.cache.backend == CacheBackend::Upstash {
        if config.cache.upstash_url.trim().is_empty() {
            issues.push("UPSTASH_REDIS_REST_URL is required when cache.backend = upstash".into());
        }
        if config.cache.upstash_token.trim().is_empty() {
            issues.push("UPSTASH_REDIS_REST_TOKEN is required when cache.backend = upstash".into());
        }
    }
    if config.cache.hotspot_ttl_secs == 0 {
        issues.push("cache.hotspot_ttl_secs must be > 0".into());
    }
    if config.cache.observation_ttl_secs == 0 {
        issues.push("cache.observation_ttl_secs must be > 0".into());
    }
    if config.cache.empty_ttl_secs > config.cache.hotspot_ttl_secs {
        issues.push("cache.empty_ttl_secs must be <= cache.hotspot_ttl_secs".into());
    }

    if config.viewport.max_regions == 0 {
        issues.push("viewport.max_regions must be > 0".into());
    }
    if config.viewport.back_days == 0 || config.viewport.back_days > config.ebird.max_back_days {
        issues.push("viewport.back_days must be in 1..=ebird.max_back_days".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load configuration from .env, the config file and the environment.
pub fn load_config() -> Result<AppConfig, Error> {
    // 1. Load .env file from the working directory or its parents.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults, then the config file if present.
    let mut config = AppConfig::default();
    let path = config_path();
    if path.exists() {
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
    } else if std::env::var(CONFIG_PATH_ENV).is_ok() {
        return Err(Error::Config(format!(
            "{CONFIG_PATH_ENV} points to a missing file: {}",
            path.display()
        )));
    }

    // 3. Environment variables win.
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;

    Ok(config)
}

/// The effective config as TOML, secrets masked.
pub fn redacted_toml(config: &AppConfig) -> Result<String, Error> {
    let mut shown = config.clone();
    for secret in [
        &mut shown.ebird.api_token,
        &mut shown.geocoding.mapbox_token,
        &mut shown.geocoding.geonames_username,
        &mut shown.cache.upstash_token,
    ] {
        if !secret.is_empty() {
            *secret = "***".into();
        }
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| Error::Config(format!("Failed to render config: {}", e)))
}
