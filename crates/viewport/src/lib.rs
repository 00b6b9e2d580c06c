//! Map-side region tracking and marker sync.
//!
//! As the user pans and zooms, [`RegionTracker`] works out which counties
//! are on screen, [`MarkerSync`] diffs that against the marker cache and
//! fetches or evicts per-county hotspots, and [`MapSession`] ties both to
//! the view, place search and the hotspot detail panel.

pub mod locations;
pub mod proxy;
pub mod session;
pub mod sync;
pub mod tracker;

pub use proxy::ProxyClient;
pub use session::{DetailPanel, MapSession, MoveOutcome, ObservationSource, PlaceSearch};
pub use sync::{MarkerSync, RegionFetcher, SyncReport, SyncState};
pub use tracker::{RegionTracker, RenderedFeature, RenderedMap, Visibility, TOO_MANY_REGIONS_WARNING};
