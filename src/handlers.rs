//! Proxy endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::region::{is_valid_location_id, is_valid_region_code};
use common::GeocodeResponse;
use geo_client::{validate_coordinates, validate_query};
use kv_cache::{location_observations_key, region_hotspots_key, CachedPayload, TtlPolicy};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::AppError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct HotspotParams {
    regioncode: Option<String>,
    back: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ObservationParams {
    #[serde(rename = "locationCode")]
    location_code: Option<String>,
    back: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodingParams {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CountyParams {
    lat: Option<String>,
    lng: Option<String>,
}

// ── Helpers ───────────────────────────────────────────────────────────

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::BadRequest(format!("Missing required parameter: {name}"))),
    }
}

/// Lookback in days: absent means the default, otherwise `1..=max`.
fn parse_back(raw: Option<&str>, default: u32, max: u32) -> Result<u32, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    match raw.parse::<u32>() {
        Ok(back) if (1..=max).contains(&back) => Ok(back),
        _ => Err(AppError::BadRequest(format!(
            "back must be an integer between 1 and {max}"
        ))),
    }
}

fn parse_coordinate(raw: Option<&str>, name: &str) -> Result<f64, AppError> {
    let raw = required(raw, name)?;
    raw.parse::<f64>()
        .map_err(|_| AppError::BadRequest(format!("{name} must be a number")))
}

fn json_payload(payload: CachedPayload) -> Response {
    (
        StatusCode::OK,
        [
            ("Content-Type", "application/json"),
            ("X-Cache", payload.status.as_str()),
        ],
        payload.body,
    )
        .into_response()
}

// ── Handlers ──────────────────────────────────────────────────────────

/// `GET /hotspots?regioncode=US-WA-033&back=7`
pub async fn hotspots(
    State(state): State<AppState>,
    Query(params): Query<HotspotParams>,
) -> Result<Response, AppError> {
    let region = required(params.regioncode.as_deref(), "regioncode")?.to_ascii_uppercase();
    if !is_valid_region_code(&region) {
        return Err(AppError::BadRequest(format!("Invalid regioncode: {region}")));
    }
    let ebird = &state.config.ebird;
    let back = parse_back(params.back.as_deref(), ebird.default_back_days, ebird.max_back_days)?;
    debug!("hotspots region={} back={}", region, back);

    let bird_data = &state.bird_data;
    let region_code = region.as_str();
    let fetch = || async move { bird_data.hotspots(region_code, back).await };

    let payload = if back == ebird.default_back_days {
        let cache = &state.config.cache;
        let policy = TtlPolicy::from_secs(cache.hotspot_ttl_secs, cache.empty_ttl_secs);
        state
            .cache
            .get_or_fetch(&region_hotspots_key(region_code), policy, fetch)
            .await?
    } else {
        state.cache.bypass(fetch).await?
    };
    Ok(json_payload(payload))
}

/// `GET /observations?locationCode=L123456&back=7`
pub async fn observations(
    State(state): State<AppState>,
    Query(params): Query<ObservationParams>,
) -> Result<Response, AppError> {
    let loc_id = required(params.location_code.as_deref(), "locationCode")?;
    if !is_valid_location_id(loc_id) {
        return Err(AppError::BadRequest(format!("Invalid locationCode: {loc_id}")));
    }
    let ebird = &state.config.ebird;
    let back = parse_back(params.back.as_deref(), ebird.default_back_days, ebird.max_back_days)?;
    debug!("observations loc={} back={}", loc_id, back);

    let bird_data = &state.bird_data;
    let fetch = || async move { bird_data.recent_observations(loc_id, back).await };

    let payload = if back == ebird.default_back_days {
        let cache = &state.config.cache;
        let policy = TtlPolicy::from_secs(cache.observation_ttl_secs, cache.empty_ttl_secs);
        state
            .cache
            .get_or_fetch(&location_observations_key(loc_id), policy, fetch)
            .await?
    } else {
        state.cache.bypass(fetch).await?
    };
    Ok(json_payload(payload))
}

/// `GET /geocoding?q=seattle, wa`
pub async fn geocoding(
    State(state): State<AppState>,
    Query(params): Query<GeocodingParams>,
) -> Result<Json<GeocodeResponse>, AppError> {
    let raw = params.q.as_deref().unwrap_or_default();
    let query = validate_query(raw, state.config.geocoding.max_query_len)?;
    debug!("geocoding via {}: {}", state.geocoder.provider_name(), query);

    match state.geocoder.geocode(query).await? {
        Some(place) => Ok(Json(GeocodeResponse {
            query: query.to_string(),
            features: vec![place],
        })),
        None => Err(AppError::NotFound(format!("Could not get location: {query}"))),
    }
}

/// `GET /county?lat=47.6&lng=-122.3`
pub async fn county(
    State(state): State<AppState>,
    Query(params): Query<CountyParams>,
) -> Result<Response, AppError> {
    let lat = parse_coordinate(params.lat.as_deref(), "lat")?;
    let lng = parse_coordinate(params.lng.as_deref(), "lng")?;
    validate_coordinates(lat, lng)?;

    match state.counties.county_at(lat, lng).await? {
        Some(county) => Ok(Json(county).into_response()),
        None => Err(AppError::NotFound(format!(
            "No US county at {lat}, {lng}"
        ))),
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "ok",
        "cacheBackend": state.cache.store().backend_name(),
        "startedAt": state.started_at.to_rfc3339(),
    }))
    .into_response()
}
