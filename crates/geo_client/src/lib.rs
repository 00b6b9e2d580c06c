//! Place search and county lookup clients.
//!
//! Two geocoding providers sit behind the [`Geocoder`] trait: Mapbox
//! (`features[0].center`) and GeoNames (`address.lat/lng`). Both are
//! normalized to [`common::PlaceMatch`]. County lookups use the FCC
//! census block API.

pub mod fcc;
pub mod geonames;
pub mod mapbox;
pub mod validate;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::config::{GeocodingConfig, GeocodingProvider};
use common::{CountyInfo, Error, PlaceMatch};
use tracing::debug;

pub use fcc::FccCountyClient;
pub use geonames::GeonamesGeocoder;
pub use mapbox::MapboxGeocoder;
pub use validate::{validate_coordinates, validate_query};

/// Free-text place search.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Best match for `query`, or `None` when the provider has no match.
    async fn geocode(&self, query: &str) -> Result<Option<PlaceMatch>, Error>;

    fn provider_name(&self) -> &'static str;
}

/// Coordinate → county resolution.
#[async_trait]
pub trait CountyLookup: Send + Sync {
    /// County containing the point, or `None` outside the US.
    async fn county_at(&self, lat: f64, lng: f64) -> Result<Option<CountyInfo>, Error>;
}

/// Build the geocoder selected in config.
pub fn geocoder_from_config(config: &GeocodingConfig) -> Result<Arc<dyn Geocoder>, Error> {
    let geocoder: Arc<dyn Geocoder> = match config.provider {
        GeocodingProvider::Mapbox => Arc::new(MapboxGeocoder::new(config)?),
        GeocodingProvider::Geonames => Arc::new(GeonamesGeocoder::new(config)?),
    };
    Ok(geocoder)
}

pub(crate) fn build_http_client(service: &str, timeout_secs: u64) -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .user_agent(concat!("bird-hotspot/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(4)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::Http(format!("failed to build {service} HTTP client: {e}")))
}

/// GET a URL and return the body of a successful response.
pub(crate) async fn fetch(
    client: &reqwest::Client,
    service: &'static str,
    url: url::Url,
) -> Result<String, Error> {
    debug!("GET {} ({})", redact(&url), service);

    common::http::get_text(client.get(url), service).await
}

/// URL with credential query parameters masked, for logs.
fn redact(url: &url::Url) -> String {
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "access_token" || k == "username" {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    if !pairs.is_empty() {
        masked.query_pairs_mut().clear().extend_pairs(pairs);
    }
    masked.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_masks_credentials() {
        let url = url::Url::parse(
            "https://api.mapbox.com/geocoding/v5/mapbox.places/x.json?access_token=secret&limit=1",
        )
        .unwrap();
        let shown = redact(&url);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("limit=1"));
    }

    #[test]
    fn test_geocoder_from_config_picks_provider() {
        let mut config = GeocodingConfig::default();
        assert_eq!(geocoder_from_config(&config).unwrap().provider_name(), "mapbox");

        config.provider = GeocodingProvider::Geonames;
        assert_eq!(geocoder_from_config(&config).unwrap().provider_name(), "geonames");
    }
}
