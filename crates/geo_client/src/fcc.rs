//! FCC census block lookup: which county contains a coordinate.

use async_trait::async_trait;
use common::config::GeocodingConfig;
use common::region::{ebird_region_from_fips, normalize_fips, state_postal};
use common::{CountyInfo, Error};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::{build_http_client, fetch, validate_coordinates, CountyLookup};

const SERVICE: &str = "FCC";

/// Response from `/block/find`. Every area is null outside the US.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockFindResponse {
    #[serde(default)]
    pub county: Option<Area>,
    #[serde(default)]
    pub state: Option<Area>,
    #[serde(rename = "status", default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct Area {
    #[serde(rename = "FIPS", default)]
    pub fips: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

pub fn parse_block_find(body: &str) -> Result<Option<CountyInfo>, Error> {
    let parsed: BlockFindResponse =
        serde_json::from_str(body).map_err(|e| Error::MalformedResponse {
            service: SERVICE,
            message: e.to_string(),
        })?;

    if !parsed.status.is_empty() && parsed.status != "OK" {
        return Err(Error::Upstream {
            service: SERVICE,
            status: 502,
            message: format!("status {}", parsed.status),
        });
    }

    let Some(county) = parsed.county else {
        return Ok(None);
    };
    let Some(fips) = county.fips.as_deref().and_then(normalize_fips) else {
        return Ok(None);
    };
    // Territories (PR, GU, VI, AS, MP) have FCC counties but no eBird county mapping here.
    if state_postal(&fips[..2]).is_none() {
        debug!("No eBird county region for FIPS {}", fips);
        return Ok(None);
    }
    let state = parsed.state.unwrap_or(Area {
        fips: None,
        code: None,
        name: None,
    });

    Ok(Some(CountyInfo {
        region_code: ebird_region_from_fips(&fips)?,
        fips,
        name: county.name.unwrap_or_default(),
        state_code: state.code.unwrap_or_default(),
        state_name: state.name.unwrap_or_default(),
    }))
}

#[derive(Debug, Clone)]
pub struct FccCountyClient {
    client: reqwest::Client,
    base_url: String,
}

impl FccCountyClient {
    pub fn new(config: &GeocodingConfig) -> Result<Self, Error> {
        Ok(Self {
            client: build_http_client(SERVICE, config.timeout_secs)?,
            base_url: config.fcc_base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn block_url(&self, lat: f64, lng: f64) -> Result<Url, Error> {
        let mut url = Url::parse(&format!("{}/block/find", self.base_url))
            .map_err(|e| Error::Config(format!("invalid FCC base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("latitude", &lat.to_string())
            .append_pair("longitude", &lng.to_string())
            .append_pair("showall", "false")
            .append_pair("format", "json");
        Ok(url)
    }
}

#[async_trait]
impl CountyLookup for FccCountyClient {
    async fn county_at(&self, lat: f64, lng: f64) -> Result<Option<CountyInfo>, Error> {
        validate_coordinates(lat, lng)?;
        let body = fetch(&self.client, SERVICE, self.block_url(lat, lng)?).await?;
        parse_block_find(&body)
    }
}
