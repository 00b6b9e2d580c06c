//! One user's map: the camera, the marker cache and the detail panel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config::ViewportConfig;
use common::{Error, HotspotFeature, HotspotProperties, Observation, PlaceMatch, ViewState};
use tracing::{debug, info, warn};

use crate::locations::random_location;
use crate::proxy::ProxyClient;
use crate::sync::{MarkerSync, RegionFetcher, SyncReport};
use crate::tracker::{RegionTracker, RenderedMap, Visibility};

/// Recent sightings at a hotspot.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn recent_observations(&self, loc_id: &str) -> Result<Vec<Observation>, Error>;
}

/// Free-text place search. `Ok(None)` means nothing matched.
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Option<PlaceMatch>, Error>;
}

/// The slide-out panel for the selected hotspot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailPanel {
    pub selected: Option<HotspotProperties>,
    pub observations: Vec<Observation>,
    /// Set when the fetch failed or the hotspot had nothing recent.
    pub no_observations: bool,
}

impl DetailPanel {
    pub fn is_open(&self) -> bool {
        self.selected.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// The map has not loaded yet; nothing was done.
    NotReady,
    /// Too many regions on screen; the marker cache was left alone.
    TooManyRegions {
        total: usize,
        max: usize,
        warning: &'static str,
    },
    Synced(SyncReport),
}

pub struct MapSession {
    view: ViewState,
    tracker: RegionTracker,
    sync: Arc<MarkerSync>,
    observations: Arc<dyn ObservationSource>,
    places: Arc<dyn PlaceSearch>,
    detail: DetailPanel,
    warning: Option<&'static str>,
    last_sync_at: Option<DateTime<Utc>>,
}

impl MapSession {
    pub fn new(
        tracker: RegionTracker,
        fetcher: Arc<dyn RegionFetcher>,
        observations: Arc<dyn ObservationSource>,
        places: Arc<dyn PlaceSearch>,
        negative_ttl: Duration,
    ) -> Self {
        Self {
            view: random_location(),
            tracker,
            sync: Arc::new(MarkerSync::new(fetcher, negative_ttl)),
            observations,
            places,
            detail: DetailPanel::default(),
            warning: None,
            last_sync_at: None,
        }
    }

    /// A session talking to the proxy at `config.proxy_base_url`.
    pub fn with_proxy(config: &ViewportConfig) -> Result<Self, Error> {
        let proxy = Arc::new(ProxyClient::from_config(config)?);
        Ok(Self::new(
            RegionTracker::from_config(config),
            proxy.clone(),
            proxy.clone(),
            proxy,
            Duration::from_secs(config.negative_ttl_secs),
        ))
    }

    // ── State ─────────────────────────────────────────────────────────

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn detail(&self) -> &DetailPanel {
        &self.detail
    }

    pub fn markers(&self) -> Vec<HotspotFeature> {
        self.sync.markers()
    }

    pub fn marker_sync(&self) -> &Arc<MarkerSync> {
        &self.sync
    }

    pub fn is_selected(&self, loc_id: &str) -> bool {
        self.detail
            .selected
            .as_ref()
            .is_some_and(|selected| selected.loc_id == loc_id)
    }

    /// Warning from the most recent move, if any.
    pub fn warning(&self) -> Option<&'static str> {
        self.warning
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.last_sync_at
    }

    // ── Camera ────────────────────────────────────────────────────────

    /// The camera settled at `view`.
    pub async fn on_move_end(
        &mut self,
        view: ViewState,
        map: Option<&dyn RenderedMap>,
    ) -> MoveOutcome {
        self.view = view;
        self.refresh(map).await
    }

    /// Re-run visibility and sync for the current view.
    pub async fn refresh(&mut self, map: Option<&dyn RenderedMap>) -> MoveOutcome {
        match self.tracker.visible_regions(map) {
            Visibility::NotReady => {
                debug!("Map not ready, skipping hotspot sync");
                MoveOutcome::NotReady
            }
            Visibility::TooMany { total, max, .. } => {
                warn!("{} regions visible (max {}), not fetching hotspots", total, max);
                let warning = crate::tracker::TOO_MANY_REGIONS_WARNING;
                self.warning = Some(warning);
                MoveOutcome::TooManyRegions {
                    total,
                    max,
                    warning,
                }
            }
            Visibility::Visible(regions) => {
                self.warning = None;
                let report = self.sync.sync(&regions).await;
                self.last_sync_at = Some(Utc::now());
                MoveOutcome::Synced(report)
            }
        }
    }

    /// Jump to the device's position.
    pub fn go_to_position(&mut self, longitude: f64, latitude: f64) {
        self.view = ViewState::centered(longitude, latitude);
    }

    /// Move to the first match for `query`. Returns whether the view moved.
    pub async fn search(&mut self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return false;
        }
        match self.places.search(query).await {
            Ok(Some(place)) => {
                let [lng, lat] = place.center;
                info!("Moving to {} ({}, {})", place.place_name, lng, lat);
                self.view = ViewState::centered(lng, lat);
                true
            }
            Ok(None) => {
                info!("Could not get location: {}", query);
                false
            }
            Err(e) => {
                warn!("Could not get location: {}: {}", query, e);
                false
            }
        }
    }

    // ── Detail panel ──────────────────────────────────────────────────

    /// Open the panel for a hotspot and load its recent observations.
    pub async fn select_marker(&mut self, properties: HotspotProperties) {
        let loc_id = properties.loc_id.clone();
        self.detail = DetailPanel {
            selected: Some(properties),
            observations: Vec::new(),
            no_observations: false,
        };

        match self.observations.recent_observations(&loc_id).await {
            Ok(observations) => {
                self.detail.no_observations = observations.is_empty();
                self.detail.observations = observations;
            }
            Err(e) => {
                warn!("Failed to load observations for {}: {}", loc_id, e);
                self.detail.no_observations = true;
            }
        }
    }

    pub fn close_detail(&mut self) {
        self.detail = DetailPanel::default();
    }
}
