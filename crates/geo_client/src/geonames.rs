//! GeoNames address geocoding (`geoCodeAddressJSON`).
//!
//! GeoNames reports most failures with HTTP 200 and a `status` object,
//! so the body is inspected before the address.

use async_trait::async_trait;
use common::config::GeocodingConfig;
use common::{Error, PlaceMatch};
use serde::Deserialize;
use url::Url;

use crate::{build_http_client, fetch, Geocoder};

const SERVICE: &str = "GeoNames";

/// GeoNames status code for "no result found".
const NO_RESULT: u32 = 15;

#[derive(Debug, Deserialize)]
pub struct GeonamesResponse {
    #[serde(default)]
    pub address: Option<GeonamesAddress>,
    #[serde(default)]
    pub status: Option<GeonamesStatus>,
}

/// Coordinates come back as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeonamesAddress {
    pub lat: String,
    pub lng: String,
    #[serde(default)]
    pub placename: String,
    #[serde(default)]
    pub admin_code1: String,
}

#[derive(Debug, Deserialize)]
pub struct GeonamesStatus {
    #[serde(default)]
    pub message: String,
    pub value: u32,
}

pub fn parse_address(body: &str) -> Result<Option<PlaceMatch>, Error> {
    let malformed = |message: String| Error::MalformedResponse {
        service: SERVICE,
        message,
    };

    let parsed: GeonamesResponse =
        serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;

    if let Some(status) = parsed.status {
        if status.value == NO_RESULT {
            return Ok(None);
        }
        return Err(Error::Upstream {
            service: SERVICE,
            status: 502,
            message: format!("status {}: {}", status.value, status.message),
        });
    }

    let Some(address) = parsed.address else {
        return Ok(None);
    };
    let lat: f64 = address
        .lat
        .trim()
        .parse()
        .map_err(|_| malformed(format!("bad latitude {:?}", address.lat)))?;
    let lng: f64 = address
        .lng
        .trim()
        .parse()
        .map_err(|_| malformed(format!("bad longitude {:?}", address.lng)))?;

    let place_name = match (address.placename.is_empty(), address.admin_code1.is_empty()) {
        (false, false) => format!("{}, {}", address.placename, address.admin_code1),
        (false, true) => address.placename,
        _ => String::new(),
    };

    Ok(Some(PlaceMatch {
        center: [lng, lat],
        place_name,
    }))
}

#[derive(Debug, Clone)]
pub struct GeonamesGeocoder {
    client: reqwest::Client,
    base_url: String,
    username: String,
}

impl GeonamesGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self, Error> {
        Ok(Self {
            client: build_http_client(SERVICE, config.timeout_secs)?,
            base_url: config.geonames_base_url.trim().trim_end_matches('/').to_string(),
            username: config.geonames_username.clone(),
        })
    }

    pub fn search_url(&self, query: &str) -> Result<Url, Error> {
        let mut url = Url::parse(&format!("{}/geoCodeAddressJSON", self.base_url))
            .map_err(|e| Error::Config(format!("invalid GeoNames base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("username", &self.username);
        Ok(url)
    }
}

#[async_trait]
impl Geocoder for GeonamesGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<PlaceMatch>, Error> {
        let body = fetch(&self.client, SERVICE, self.search_url(query)?).await?;
        parse_address(&body)
    }

    fn provider_name(&self) -> &'static str {
        "geonames"
    }
}
