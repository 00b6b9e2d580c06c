//! Which regions are on screen.
//!
//! The county boundary layer is drawn fully transparent; querying its
//! rendered features is how we learn which counties intersect the view.

use std::collections::BTreeSet;

use common::config::ViewportConfig;
use common::region::normalize_fips;
use serde_json::{Map, Value};

pub const TOO_MANY_REGIONS_WARNING: &str =
    "Unable to fetch all the birding hotspots. Try zooming in.";

/// A feature as reported by the renderer for one layer.
#[derive(Debug, Clone, Default)]
pub struct RenderedFeature {
    pub properties: Map<String, Value>,
}

impl RenderedFeature {
    pub fn with_property(key: &str, value: Value) -> Self {
        let mut properties = Map::new();
        properties.insert(key.to_string(), value);
        Self { properties }
    }
}

/// The renderer, reduced to the one query the tracker needs.
pub trait RenderedMap {
    /// Features of `layer` currently drawn inside the viewport.
    fn query_rendered_features(&self, layer: &str) -> Vec<RenderedFeature>;
}

/// Result of one visibility computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// The map has not finished loading.
    NotReady,
    /// Sorted, deduplicated region ids.
    Visible(Vec<String>),
    /// More than `max` regions are visible; `regions` holds the first `max`.
    TooMany {
        regions: Vec<String>,
        total: usize,
        max: usize,
    },
}

impl Visibility {
    pub fn regions(&self) -> &[String] {
        match self {
            Visibility::NotReady => &[],
            Visibility::Visible(regions) | Visibility::TooMany { regions, .. } => regions,
        }
    }

    /// Message to show the user, if any.
    pub fn warning(&self) -> Option<&'static str> {
        match self {
            Visibility::TooMany { .. } => Some(TOO_MANY_REGIONS_WARNING),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegionTracker {
    layer: String,
    property: String,
    max_regions: usize,
}

impl RegionTracker {
    pub fn new(layer: impl Into<String>, property: impl Into<String>, max_regions: usize) -> Self {
        Self {
            layer: layer.into(),
            property: property.into(),
            max_regions,
        }
    }

    pub fn from_config(config: &ViewportConfig) -> Self {
        Self::new(&config.county_layer, &config.region_property, config.max_regions)
    }

    pub fn max_regions(&self) -> usize {
        self.max_regions
    }

    pub fn visible_regions(&self, map: Option<&dyn RenderedMap>) -> Visibility {
        let Some(map) = map else {
            return Visibility::NotReady;
        };

        let regions: BTreeSet<String> = map
            .query_rendered_features(&self.layer)
            .iter()
            .filter_map(|feature| feature.properties.get(&self.property))
            .filter_map(region_id)
            .collect();

        let total = regions.len();
        if total > self.max_regions {
            return Visibility::TooMany {
                regions: regions.into_iter().take(self.max_regions).collect(),
                total,
                max: self.max_regions,
            };
        }
        Visibility::Visible(regions.into_iter().collect())
    }
}

/// Region id from a feature attribute. Numeric FIPS codes are zero-padded.
fn region_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| normalize_fips(&n.to_string())),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(normalize_fips(trimmed).unwrap_or_else(|| trimmed.to_string()))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FakeMap(Vec<RenderedFeature>);

    impl RenderedMap for FakeMap {
        fn query_rendered_features(&self, layer: &str) -> Vec<RenderedFeature> {
            assert_eq!(layer, "countyLayer");
            self.0.clone()
        }
    }

    fn county(fips: Value) -> RenderedFeature {
        RenderedFeature::with_property("FIPS", fips)
    }

    fn tracker(max: usize) -> RegionTracker {
        RegionTracker::new("countyLayer", "FIPS", max)
    }

    #[test]
    fn test_not_ready_without_map() {
        assert_eq!(tracker(20).visible_regions(None), Visibility::NotReady);
    }

    #[test]
    fn test_sorted_and_deduplicated() {
        // A county split across tiles shows up more than once.
        let map = FakeMap(vec![
            county(json!("53061")),
            county(json!("53033")),
            county(json!(53033)),
            county(json!("53033")),
        ]);
        assert_eq!(
            tracker(20).visible_regions(Some(&map)),
            Visibility::Visible(vec!["53033".into(), "53061".into()])
        );
    }

    #[test]
    fn test_numeric_fips_padded_and_junk_skipped() {
        let map = FakeMap(vec![
            county(json!(1001)),
            county(json!(null)),
            county(json!("")),
            RenderedFeature::default(),
        ]);
        assert_eq!(
            tracker(20).visible_regions(Some(&map)),
            Visibility::Visible(vec!["01001".into()])
        );
    }

    #[test]
    fn test_never_exceeds_max() {
        let map = FakeMap((0..30).map(|i| county(json!(format!("53{:03}", i)))).collect());
        let visibility = tracker(20).visible_regions(Some(&map));

        assert_eq!(visibility.regions().len(), 20);
        assert_eq!(visibility.warning(), Some(TOO_MANY_REGIONS_WARNING));
        match visibility {
            Visibility::TooMany { total, max, regions } => {
                assert_eq!(total, 30);
                assert_eq!(max, 20);
                assert_eq!(regions.first().map(String::as_str), Some("53000"));
            }
            other => panic!("expected TooMany, got {:?}", other),
        }
    }

    #[test]
    fn test_exactly_max_is_fine() {
        let map = FakeMap((0..20).map(|i| county(json!(format!("53{:03}", i)))).collect());
        let visibility = tracker(20).visible_regions(Some(&map));
        assert!(matches!(visibility, Visibility::Visible(ref r) if r.len() == 20));
        assert_eq!(visibility.warning(), None);
    }
}
