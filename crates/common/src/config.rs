//! Application configuration types.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// eBird API access.
    #[serde(default)]
    pub ebird: EbirdConfig,

    /// Place search provider.
    #[serde(default)]
    pub geocoding: GeocodingConfig,

    /// Remote key-value cache in front of eBird.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Map-side region tracking and marker sync.
    #[serde(default)]
    pub viewport: ViewportConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// eBird API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbirdConfig {
    /// Value sent as `X-eBirdApiToken`.
    #[serde(default)]
    pub api_token: String,

    /// Base URL of the eBird API (no trailing slash).
    #[serde(default = "default_ebird_base_url")]
    pub base_url: String,

    /// Lookback window (days) used when a request omits `back`.
    #[serde(default = "default_back_days")]
    pub default_back_days: u32,

    /// Largest lookback window eBird accepts.
    #[serde(default = "default_max_back_days")]
    pub max_back_days: u32,

    /// Outbound request budget per second.
    #[serde(default = "default_requests_per_sec")]
    pub requests_per_sec: u32,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Supported geocoding backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeocodingProvider {
    Mapbox,
    Geonames,
}

/// Geocoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default = "default_geocoding_provider")]
    pub provider: GeocodingProvider,

    /// Mapbox access token (required for the Mapbox provider).
    #[serde(default)]
    pub mapbox_token: String,

    #[serde(default = "default_mapbox_base_url")]
    pub mapbox_base_url: String,

    /// GeoNames account name (required for the GeoNames provider).
    #[serde(default)]
    pub geonames_username: String,

    #[serde(default = "default_geonames_base_url")]
    pub geonames_base_url: String,

    /// FCC census block API used for coordinate → county lookups.
    #[serde(default = "default_fcc_base_url")]
    pub fcc_base_url: String,

    /// Longest accepted free-text query, in characters.
    #[serde(default = "default_max_query_len")]
    pub max_query_len: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Cache backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Upstash Redis over its REST API.
    Upstash,
    /// Process-local map; lost on restart.
    Memory,
    /// Every request goes upstream.
    Disabled,
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackend::Upstash => "upstash",
            CacheBackend::Memory => "memory",
            CacheBackend::Disabled => "disabled",
        }
    }
}

/// Cache settings (TTLs in seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,

    #[serde(default)]
    pub upstash_url: String,

    #[serde(default)]
    pub upstash_token: String,

    /// TTL for `region-hotspots-*` entries.
    #[serde(default = "default_hotspot_ttl")]
    pub hotspot_ttl_secs: u64,

    /// TTL for `location-observations-*` entries.
    #[serde(default = "default_observation_ttl")]
    pub observation_ttl_secs: u64,

    /// TTL for payloads that came back empty.
    #[serde(default = "default_negative_ttl")]
    pub empty_ttl_secs: u64,
}

/// Map-side settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewportConfig {
    /// Most regions fetched for one viewport.
    #[serde(default = "default_max_regions")]
    pub max_regions: usize,

    /// Rendered layer holding county polygons.
    #[serde(default = "default_county_layer")]
    pub county_layer: String,

    /// Feature property carrying the county FIPS code.
    #[serde(default = "default_region_property")]
    pub region_property: String,

    /// Lookback window requested for hotspots and observations.
    #[serde(default = "default_back_days")]
    pub back_days: u32,

    /// How long a failed or empty region is left alone before retrying.
    #[serde(default = "default_negative_ttl")]
    pub negative_ttl_secs: u64,

    /// Base URL of the proxy endpoints, as seen from the map client.
    #[serde(default = "default_proxy_base_url")]
    pub proxy_base_url: String,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_bind_addr() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8888
}

fn default_ebird_base_url() -> String {
    "https://api.ebird.org/v2".into()
}
fn default_back_days() -> u32 {
    7
}
fn default_max_back_days() -> u32 {
    30
}
fn default_requests_per_sec() -> u32 {
    10
}
fn default_timeout_secs() -> u64 {
    15
}

fn default_geocoding_provider() -> GeocodingProvider {
    GeocodingProvider::Mapbox
}
fn default_mapbox_base_url() -> String {
    "https://api.mapbox.com/geocoding/v5/mapbox.places".into()
}
fn default_geonames_base_url() -> String {
    "http://api.geonames.org".into()
}
fn default_fcc_base_url() -> String {
    "https://geo.fcc.gov/api/census".into()
}
fn default_max_query_len() -> usize {
    100
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::Memory
}
fn default_hotspot_ttl() -> u64 {
    86_400
}
fn default_observation_ttl() -> u64 {
    3_600
}
fn default_negative_ttl() -> u64 {
    300
}

fn default_max_regions() -> usize {
    20
}
fn default_county_layer() -> String {
    "countyLayer".into()
}
fn default_region_property() -> String {
    "FIPS".into()
}
fn default_proxy_base_url() -> String {
    "http://localhost:8888".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl Default for EbirdConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: default_ebird_base_url(),
            default_back_days: default_back_days(),
            max_back_days: default_max_back_days(),
            requests_per_sec: default_requests_per_sec(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            provider: default_geocoding_provider(),
            mapbox_token: String::new(),
            mapbox_base_url: default_mapbox_base_url(),
            geonames_username: String::new(),
            geonames_base_url: default_geonames_base_url(),
            fcc_base_url: default_fcc_base_url(),
            max_query_len: default_max_query_len(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            upstash_url: String::new(),
            upstash_token: String::new(),
            hotspot_ttl_secs: default_hotspot_ttl(),
            observation_ttl_secs: default_observation_ttl(),
            empty_ttl_secs: default_negative_ttl(),
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            max_regions: default_max_regions(),
            county_layer: default_county_layer(),
            region_property: default_region_property(),
            back_days: default_back_days(),
            negative_ttl_secs: default_negative_ttl(),
            proxy_base_url: default_proxy_base_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let raw = r#"
            [cache]
            backend = "upstash"
            hotspot_ttl_secs = 600

            [geocoding]
            provider = "geonames"
        "#;
        let config: AppConfig = toml::from_str(raw).expect("config should parse");

        assert_eq!(config.cache.backend, CacheBackend::Upstash);
        assert_eq!(config.cache.hotspot_ttl_secs, 600);
        assert_eq!(config.cache.observation_ttl_secs, 3_600);
        assert_eq!(config.geocoding.provider, GeocodingProvider::Geonames);
        assert_eq!(config.viewport.max_regions, 20);
        assert_eq!(config.server.port, 8888);
        assert_eq!(config.ebird.base_url, "https://api.ebird.org/v2");
    }
}
