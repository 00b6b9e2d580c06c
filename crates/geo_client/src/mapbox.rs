//! Mapbox forward geocoding (`mapbox.places`).

use async_trait::async_trait;
use common::config::GeocodingConfig;
use common::{Error, PlaceMatch};
use serde::Deserialize;
use url::Url;

use crate::{build_http_client, fetch, Geocoder};

const SERVICE: &str = "Mapbox";

#[derive(Debug, Deserialize)]
pub struct MapboxResponse {
    #[serde(default)]
    pub features: Vec<MapboxFeature>,
}

#[derive(Debug, Deserialize)]
pub struct MapboxFeature {
    pub center: [f64; 2],
    #[serde(default)]
    pub place_name: String,
}

/// First feature of a Mapbox response, if any.
pub fn parse_first_match(body: &str) -> Result<Option<PlaceMatch>, Error> {
    let parsed: MapboxResponse = serde_json::from_str(body).map_err(|e| Error::MalformedResponse {
        service: SERVICE,
        message: e.to_string(),
    })?;
    Ok(parsed.features.into_iter().next().map(|f| PlaceMatch {
        center: f.center,
        place_name: f.place_name,
    }))
}

#[derive(Debug, Clone)]
pub struct MapboxGeocoder {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl MapboxGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self, Error> {
        Ok(Self {
            client: build_http_client(SERVICE, config.timeout_secs)?,
            base_url: config.mapbox_base_url.trim().trim_end_matches('/').to_string(),
            token: config.mapbox_token.clone(),
        })
    }

    /// `{base}/{query}.json?access_token=..&limit=1&country=us`, query percent-encoded.
    pub fn search_url(&self, query: &str) -> Result<Url, Error> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid Mapbox base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config("Mapbox base URL cannot have a path".into()))?
            .push(&format!("{query}.json"));
        url.query_pairs_mut()
            .append_pair("access_token", &self.token)
            .append_pair("limit", "1")
            .append_pair("country", "us");
        Ok(url)
    }
}

#[async_trait]
impl Geocoder for MapboxGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<PlaceMatch>, Error> {
        let body = fetch(&self.client, SERVICE, self.search_url(query)?).await?;
        parse_first_match(&body)
    }

    fn provider_name(&self) -> &'static str {
        "mapbox"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_match() {
        let body = r#"{
            "type": "FeatureCollection",
            "query": ["seattle"],
            "features": [
                {"id": "place.1", "place_name": "Seattle, Washington, United States", "center": [-122.3301, 47.6038]},
                {"id": "place.2", "place_name": "Seattle Hill, Washington", "center": [-122.1, 47.8]}
            ]
        }"#;
        let m = parse_first_match(body).unwrap().expect("a match");
        assert_eq!(m.center, [-122.3301, 47.6038]);
        assert_eq!(m.place_name, "Seattle, Washington, United States");
    }

    #[test]
    fn test_no_features_is_none() {
        let body = r#"{"type": "FeatureCollection", "features": []}"#;
        assert!(parse_first_match(body).unwrap().is_none());
    }

    #[test]
    fn test_search_url_encodes_query() {
        let config = GeocodingConfig {
            mapbox_token: "tok".into(),
            ..GeocodingConfig::default()
        };
        let geocoder = MapboxGeocoder::new(&config).unwrap();
        let url = geocoder.search_url("St. Paul, MN").unwrap();

        assert!(url
            .as_str()
            .starts_with("https://api.mapbox.com/geocoding/v5/mapbox.places/St.%20Paul,%20MN.json?"));
        assert!(url.as_str().contains("access_token=tok"));
    }
}
