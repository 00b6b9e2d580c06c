//! Starting points for a fresh map.

use common::ViewState;
use rand::seq::SliceRandom;

/// `[longitude, latitude]` of well-known US birding areas.
pub const DEFAULT_LOCATIONS: [[f64; 2]; 10] = [
    [-122.3321, 47.6062],  // Seattle, WA
    [-122.4194, 37.7749],  // San Francisco, CA
    [-110.9747, 32.2226],  // Tucson, AZ
    [-97.3964, 27.8006],   // Corpus Christi, TX
    [-80.1918, 25.7617],   // Miami, FL
    [-74.8060, 39.0040],   // Cape May, NJ
    [-70.0700, 41.6688],   // Cape Cod, MA
    [-82.8160, 41.6300],   // Magee Marsh, OH
    [-96.7026, 40.8136],   // Lincoln, NE
    [-105.2705, 40.0150],  // Boulder, CO
];

/// A default location at the standard zoom, picked at random.
pub fn random_location() -> ViewState {
    let [lng, lat] = DEFAULT_LOCATIONS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DEFAULT_LOCATIONS[0]);
    ViewState::centered(lng, lat)
}
