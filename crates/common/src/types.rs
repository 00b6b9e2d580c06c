//! Domain types shared across the workspace.

use serde::{Deserialize, Serialize};

// ── Map Types ─────────────────────────────────────────────────────────

/// Zoom used whenever the view jumps to a point (search, geolocation, startup).
pub const DEFAULT_ZOOM: f64 = 9.5;

/// Map camera: center and zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
}

impl ViewState {
    /// A view centered on a point at the default zoom.
    pub fn centered(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
            zoom: DEFAULT_ZOOM,
        }
    }
}

// ── Hotspot Types ─────────────────────────────────────────────────────

/// GeoJSON point geometry. `coordinates` is `[lng, lat]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Feature,
}

/// Descriptive properties of a birding hotspot marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotProperties {
    pub loc_id: String,
    pub loc_name: String,
    pub country_code: String,
    pub subnational1_code: String,
    #[serde(default)]
    pub subnational2_code: Option<String>,
}

/// A hotspot as a GeoJSON point feature, the shape served to the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotFeature {
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    pub geometry: PointGeometry,
    pub properties: HotspotProperties,
}

impl HotspotFeature {
    pub fn point(lng: f64, lat: f64, properties: HotspotProperties) -> Self {
        Self {
            kind: FeatureKind::Feature,
            geometry: PointGeometry {
                kind: GeometryKind::Point,
                coordinates: [lng, lat],
            },
            properties,
        }
    }

    pub fn loc_id(&self) -> &str {
        &self.properties.loc_id
    }

    pub fn longitude(&self) -> f64 {
        self.geometry.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.geometry.coordinates[1]
    }
}

// ── Observation Types ─────────────────────────────────────────────────

/// A recent species observation at a hotspot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub species_code: String,
    pub com_name: String,
    /// eBird omits the count when the observer reported presence only.
    #[serde(default)]
    pub how_many: Option<u32>,
}

impl Observation {
    /// Count shown to the user; presence-only reports count as one bird.
    pub fn display_count(&self) -> u32 {
        self.how_many.unwrap_or(1)
    }
}

// ── Geocoding Types ───────────────────────────────────────────────────

/// One geocoding match, normalized across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceMatch {
    /// `[lng, lat]`.
    pub center: [f64; 2],
    #[serde(default)]
    pub place_name: String,
}

/// Geocoding proxy response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResponse {
    pub query: String,
    pub features: Vec<PlaceMatch>,
}

/// County containing a coordinate, as resolved by the census lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountyInfo {
    /// 5-digit county FIPS code.
    pub fips: String,
    pub name: String,
    pub state_code: String,
    pub state_name: String,
    /// eBird region code, e.g. `US-WA-033`.
    pub region_code: String,
}
