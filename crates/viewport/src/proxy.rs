//! HTTP client for the Bird Hotspot proxy endpoints, as used by the map.

use std::time::Duration;

use async_trait::async_trait;
use common::config::ViewportConfig;
use common::http::{format_error_chain, summarize_body};
use common::region::ebird_region_from_fips;
use common::{Error, GeocodeResponse, HotspotFeature, Observation, PlaceMatch};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::session::{ObservationSource, PlaceSearch};
use crate::sync::RegionFetcher;

const SERVICE: &str = "proxy";

#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: reqwest::Client,
    base_url: Url,
    back_days: u32,
}

enum Fetched<T> {
    Found(T),
    NotFound,
}

impl ProxyClient {
    pub fn new(base_url: &str, back_days: u32) -> Result<Self, Error> {
        let mut base_url = Url::parse(base_url.trim())
            .map_err(|e| Error::Config(format!("invalid proxy base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("proxy URL cannot be a base: {base_url}")));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Http(format!("failed to build proxy HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            back_days,
        })
    }

    pub fn from_config(config: &ViewportConfig) -> Result<Self, Error> {
        Self::new(&config.proxy_base_url, config.back_days)
    }

    pub fn endpoint(&self, name: &str, query: &[(&str, &str)]) -> Result<Url, Error> {
        let mut url = self
            .base_url
            .join(name)
            .map_err(|e| Error::Config(format!("bad endpoint {name}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Fetched<T>, Error> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("proxy request failed: {}", format_error_chain(&e))))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Fetched::NotFound);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Http(format!("proxy body read failed: {}", format_error_chain(&e))))?;
        if !status.is_success() {
            return Err(Error::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                message: summarize_body(&body),
            });
        }

        serde_json::from_str(&body)
            .map(Fetched::Found)
            .map_err(|e| Error::MalformedResponse {
                service: SERVICE,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl RegionFetcher for ProxyClient {
    /// `region` is a county FIPS code as read from the map.
    async fn fetch_region(&self, region: &str) -> Result<Vec<HotspotFeature>, Error> {
        let region_code = ebird_region_from_fips(region)?;
        let back = self.back_days.to_string();
        let url = self.endpoint(
            "hotspots",
            &[("regioncode", region_code.as_str()), ("back", back.as_str())],
        )?;
        match self.get_json(url).await? {
            Fetched::Found(features) => Ok(features),
            Fetched::NotFound => Err(Error::NotFound(format!("hotspots for {region_code}"))),
        }
    }
}

#[async_trait]
impl ObservationSource for ProxyClient {
    async fn recent_observations(&self, loc_id: &str) -> Result<Vec<Observation>, Error> {
        let back = self.back_days.to_string();
        let url = self.endpoint(
            "observations",
            &[("locationCode", loc_id), ("back", back.as_str())],
        )?;
        match self.get_json(url).await? {
            Fetched::Found(observations) => Ok(observations),
            Fetched::NotFound => Err(Error::NotFound(format!("observations for {loc_id}"))),
        }
    }
}

#[async_trait]
impl PlaceSearch for ProxyClient {
    async fn search(&self, query: &str) -> Result<Option<PlaceMatch>, Error> {
        let url = self.endpoint("geocoding", &[("q", query)])?;
        match self.get_json::<GeocodeResponse>(url).await? {
            Fetched::Found(resp) => Ok(resp.features.into_iter().next()),
            Fetched::NotFound => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = ProxyClient::new("https://birds.example.net/.netlify/functions", 7).unwrap();
        let url = client
            .endpoint("hotspots", &[("regioncode", "US-WA-033"), ("back", "7")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://birds.example.net/.netlify/functions/hotspots?regioncode=US-WA-033&back=7"
        );
    }

    #[test]
    fn test_endpoint_encodes_query() {
        let client = ProxyClient::new("http://localhost:8888", 7).unwrap();
        let url = client.endpoint("geocoding", &[("q", "St. Paul, MN")]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8888/geocoding?q=St.+Paul%2C+MN");
    }

    #[tokio::test]
    async fn test_bad_fips_fails_before_request() {
        let client = ProxyClient::new("http://localhost:1", 7).unwrap();
        let err = client.fetch_region("99001").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
