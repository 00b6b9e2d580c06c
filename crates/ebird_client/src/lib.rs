//! eBird API client.
//!
//! Fetches hotspot listings per region and recent observations per
//! location from `api.ebird.org/v2`, and converts hotspot rows into the
//! point features the map renders.

pub mod rate_limit;

use std::time::Duration;

use async_trait::async_trait;
use common::config::EbirdConfig;
use common::http::get_text;
use common::{Error, HotspotFeature, HotspotProperties, Observation};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

pub use rate_limit::RateLimiter;

const SERVICE: &str = "eBird";

/// Birding data needed by the proxy endpoints.
#[async_trait]
pub trait BirdData: Send + Sync {
    /// Hotspots in a region with activity in the last `back` days.
    async fn hotspots(&self, region_code: &str, back: u32) -> Result<Vec<HotspotFeature>, Error>;

    /// Most recent observation of each species at a location in the last `back` days.
    async fn recent_observations(&self, loc_id: &str, back: u32)
        -> Result<Vec<Observation>, Error>;
}

// ── eBird response types ──────────────────────────────────────────────

/// Row from `/ref/hotspot/{regionCode}?fmt=json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHotspot {
    pub loc_id: String,
    pub loc_name: String,
    pub country_code: String,
    pub subnational1_code: String,
    #[serde(default)]
    pub subnational2_code: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub latest_obs_dt: Option<String>,
    #[serde(default)]
    pub num_species_all_time: Option<u32>,
}

impl RawHotspot {
    pub fn into_feature(self) -> HotspotFeature {
        HotspotFeature::point(
            self.lng,
            self.lat,
            HotspotProperties {
                loc_id: self.loc_id,
                loc_name: self.loc_name,
                country_code: self.country_code,
                subnational1_code: self.subnational1_code,
                subnational2_code: self.subnational2_code,
            },
        )
    }
}

/// Row from `/data/obs/{locId}/recent`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObservation {
    pub species_code: String,
    pub com_name: String,
    #[serde(default)]
    pub sci_name: Option<String>,
    #[serde(default)]
    pub how_many: Option<u32>,
    #[serde(default)]
    pub obs_dt: Option<String>,
}

impl From<RawObservation> for Observation {
    fn from(raw: RawObservation) -> Self {
        Observation {
            species_code: raw.species_code,
            com_name: raw.com_name,
            how_many: raw.how_many,
        }
    }
}

/// Parse a hotspot listing and convert every row to a point feature.
///
/// Rows with coordinates outside WGS84 bounds are dropped.
pub fn parse_hotspots(body: &str) -> Result<Vec<HotspotFeature>, Error> {
    let rows: Vec<RawHotspot> = parse_json(body)?;
    let total = rows.len();
    let features: Vec<HotspotFeature> = rows
        .into_iter()
        .filter(|row| row.lat.abs() <= 90.0 && row.lng.abs() <= 180.0)
        .map(RawHotspot::into_feature)
        .collect();

    if features.len() < total {
        debug!(
            "Dropped {} hotspot rows with out-of-range coordinates",
            total - features.len()
        );
    }
    Ok(features)
}

/// Parse a recent-observations listing.
pub fn parse_observations(body: &str) -> Result<Vec<Observation>, Error> {
    let rows: Vec<RawObservation> = parse_json(body)?;
    Ok(rows.into_iter().map(Observation::from).collect())
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::MalformedResponse {
        service: SERVICE,
        message: e.to_string(),
    })
}

// ── Client ────────────────────────────────────────────────────────────

/// eBird REST client with pooled connections and a shared rate limiter.
#[derive(Debug, Clone)]
pub struct EbirdClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    limiter: RateLimiter,
}

impl EbirdClient {
    pub fn new(config: &EbirdConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bird-hotspot/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("failed to build eBird HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            limiter: RateLimiter::per_second(config.requests_per_sec),
        })
    }

    fn hotspots_url(&self, region_code: &str) -> String {
        format!("{}/ref/hotspot/{}", self.base_url, region_code)
    }

    fn observations_url(&self, loc_id: &str) -> String {
        format!("{}/data/obs/{}/recent", self.base_url, loc_id)
    }

    /// GET `url` and return the body of a 200 response.
    async fn fetch(&self, url: &str, query: &[(&str, String)]) -> Result<String, Error> {
        self.limiter.wait().await;
        debug!("GET {} {:?}", url, query);

        let request = self
            .client
            .get(url)
            .query(query)
            .header("X-eBirdApiToken", &self.api_token);
        get_text(request, SERVICE).await
    }
}

#[async_trait]
impl BirdData for EbirdClient {
    async fn hotspots(&self, region_code: &str, back: u32) -> Result<Vec<HotspotFeature>, Error> {
        let url = self.hotspots_url(region_code);
        let body = self
            .fetch(&url, &[("fmt", "json".into()), ("back", back.to_string())])
            .await?;
        let features = parse_hotspots(&body)?;
        debug!("Got {} hotspots for {}", features.len(), region_code);
        Ok(features)
    }

    async fn recent_observations(
        &self,
        loc_id: &str,
        back: u32,
    ) -> Result<Vec<Observation>, Error> {
        let url = self.observations_url(loc_id);
        let body = self.fetch(&url, &[("back", back.to_string())]).await?;
        let observations = parse_observations(&body)?;
        debug!("Got {} observations for {}", observations.len(), loc_id);
        Ok(observations)
    }
}
