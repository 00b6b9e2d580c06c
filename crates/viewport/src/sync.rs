//! Marker cache synchronizer.
//!
//! Each pass diffs the visible regions against the cache: regions that
//! left the view are evicted without a network call, regions that entered
//! it are fetched concurrently. Passes are numbered; a pass never cancels
//! an older one, so a result is applied only if its region is still in
//! the most recent visible set.
//!
//! Regions that fail or come back empty are remembered for a short while
//! so panning around them does not refetch on every move.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{Error, HotspotFeature};
use dashmap::DashMap;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

/// Source of per-region markers (normally the hotspot proxy).
#[async_trait]
pub trait RegionFetcher: Send + Sync {
    async fn fetch_region(&self, region: &str) -> Result<Vec<HotspotFeature>, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    ComputingDiff,
    Fetching,
}

/// What one pass did. Every list is sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub generation: u64,
    /// Evicted because they left the view.
    pub removed: Vec<String>,
    /// Fetched and inserted.
    pub added: Vec<String>,
    /// Fetched, but had no markers.
    pub empty: Vec<String>,
    /// Fetch failed.
    pub failed: Vec<String>,
    /// Fetched, but the region left the view before the result arrived.
    pub stale: Vec<String>,
    /// Not fetched: recently failed/empty, or already being fetched.
    pub skipped: Vec<String>,
}

pub struct MarkerSync {
    fetcher: Arc<dyn RegionFetcher>,
    markers: DashMap<String, Vec<HotspotFeature>>,
    /// Region → time until which it is not refetched.
    negative: DashMap<String, Instant>,
    negative_ttl: Duration,
    generation: AtomicU64,
    latest_visible: Mutex<HashSet<String>>,
    in_flight: Mutex<HashSet<String>>,
    passes: Mutex<PassCounts>,
}

/// Passes currently in each phase. Overlapping passes may sit in different phases.
#[derive(Debug, Default)]
struct PassCounts {
    diffing: usize,
    fetching: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MarkerSync {
    pub fn new(fetcher: Arc<dyn RegionFetcher>, negative_ttl: Duration) -> Self {
        Self {
            fetcher,
            markers: DashMap::new(),
            negative: DashMap::new(),
            negative_ttl,
            generation: AtomicU64::new(0),
            latest_visible: Mutex::new(HashSet::new()),
            in_flight: Mutex::new(HashSet::new()),
            passes: Mutex::new(PassCounts::default()),
        }
    }

    // ── Reads ─────────────────────────────────────────────────────────

    /// `ComputingDiff` while any pass is diffing, else `Fetching` while any
    /// pass awaits its fetches.
    pub fn state(&self) -> SyncState {
        let passes = lock(&self.passes);
        if passes.diffing > 0 {
            SyncState::ComputingDiff
        } else if passes.fetching > 0 {
            SyncState::Fetching
        } else {
            SyncState::Idle
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cached region ids, sorted.
    pub fn regions(&self) -> Vec<String> {
        let regions: BTreeSet<String> = self.markers.iter().map(|e| e.key().clone()).collect();
        regions.into_iter().collect()
    }

    pub fn region_markers(&self, region: &str) -> Option<Vec<HotspotFeature>> {
        self.markers.get(region).map(|entry| entry.value().clone())
    }

    /// Every cached marker, grouped by region in region order.
    pub fn markers(&self) -> Vec<HotspotFeature> {
        self.regions()
            .iter()
            .filter_map(|region| self.region_markers(region))
            .flatten()
            .collect()
    }

    pub fn contains_region(&self, region: &str) -> bool {
        self.markers.contains_key(region)
    }

    pub fn in_flight_regions(&self) -> Vec<String> {
        let in_flight = lock(&self.in_flight);
        let sorted: BTreeSet<String> = in_flight.iter().cloned().collect();
        sorted.into_iter().collect()
    }

    fn is_suppressed(&self, region: &str, now: Instant) -> bool {
        self.negative
            .get(region)
            .map(|until| *until > now)
            .unwrap_or(false)
    }

    // ── Sync pass ─────────────────────────────────────────────────────

    fn begin_pass(&self) {
        lock(&self.passes).diffing += 1;
    }

    fn finish_diff(&self) {
        let mut passes = lock(&self.passes);
        passes.diffing = passes.diffing.saturating_sub(1);
        passes.fetching += 1;
    }

    fn end_pass(&self) {
        let mut passes = lock(&self.passes);
        passes.fetching = passes.fetching.saturating_sub(1);
    }

    /// Bring the cache in line with `visible`.
    pub async fn sync(&self, visible: &[String]) -> SyncReport {
        self.begin_pass();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Instant::now();

        let visible: BTreeSet<String> = visible.iter().cloned().collect();
        *lock(&self.latest_visible) = visible.iter().cloned().collect();
        self.negative.retain(|_, until| *until > now);

        let cached: BTreeSet<String> = self.markers.iter().map(|e| e.key().clone()).collect();

        let mut report = SyncReport {
            generation,
            ..SyncReport::default()
        };

        for region in cached.difference(&visible) {
            self.markers.remove(region);
            report.removed.push(region.clone());
        }

        let mut to_fetch: Vec<String> = Vec::new();
        {
            let mut in_flight = lock(&self.in_flight);
            for region in visible.difference(&cached) {
                if self.is_suppressed(region, now) || in_flight.contains(region) {
                    report.skipped.push(region.clone());
                } else {
                    in_flight.insert(region.clone());
                    to_fetch.push(region.clone());
                }
            }
        }

        self.finish_diff();
        debug!(
            "Sync #{}: {} visible, {} removed, {} to fetch, {} skipped",
            generation,
            visible.len(),
            report.removed.len(),
            to_fetch.len(),
            report.skipped.len()
        );

        let fetcher = &self.fetcher;
        let results = join_all(to_fetch.iter().map(|region| async move {
            (region, fetcher.fetch_region(region).await)
        }))
        .await;

        for (region, result) in results {
            lock(&self.in_flight).remove(region);
            let still_visible = lock(&self.latest_visible).contains(region);

            match result {
                Ok(features) if features.is_empty() => {
                    debug!("Region {} has no hotspots", region);
                    self.negative
                        .insert(region.clone(), Instant::now() + self.negative_ttl);
                    report.empty.push(region.clone());
                }
                Ok(features) => {
                    if still_visible {
                        self.markers.insert(region.clone(), features);
                        report.added.push(region.clone());
                    } else {
                        debug!(
                            "Discarding region {} from sync #{} (now at #{}): no longer visible",
                            region,
                            generation,
                            self.generation()
                        );
                        report.stale.push(region.clone());
                    }
                }
                Err(e) => {
                    warn!("Failed to fetch hotspots for region {}: {}", region, e);
                    self.negative
                        .insert(region.clone(), Instant::now() + self.negative_ttl);
                    report.failed.push(region.clone());
                }
            }
        }

        info!(
            "Sync #{} done: +{} -{} empty={} failed={} stale={}",
            generation,
            report.added.len(),
            report.removed.len(),
            report.empty.len(),
            report.failed.len(),
            report.stale.len()
        );

        self.end_pass();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::HotspotProperties;
    use std::collections::HashMap;
    use tokio::sync::Notify;

    fn feature(loc_id: &str) -> HotspotFeature {
        HotspotFeature::point(
            -122.0,
            47.0,
            HotspotProperties {
                loc_id: loc_id.into(),
                loc_name: format!("Hotspot {}", loc_id),
                country_code: "US".into(),
                subnational1_code: "US-WA".into(),
                subnational2_code: None,
            },
        )
    }

    /// Scripted fetcher: each region maps to a fixed outcome; unknown
    /// regions return one marker. Optionally one region blocks until released.
    #[derive(Default)]
    struct ScriptedFetcher {
        empty: HashSet<String>,
        failing: HashSet<String>,
        gated: Option<(String, Arc<Notify>)>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl ScriptedFetcher {
        fn calls(&self, region: &str) -> usize {
            lock(&self.calls).get(region).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl RegionFetcher for ScriptedFetcher {
        async fn fetch_region(&self, region: &str) -> Result<Vec<HotspotFeature>, Error> {
            *lock(&self.calls).entry(region.to_string()).or_default() += 1;
            if let Some((gated, notify)) = &self.gated {
                if gated == region {
                    notify.notified().await;
                }
            }
            if self.failing.contains(region) {
                return Err(Error::Upstream {
                    service: "proxy",
                    status: 500,
                    message: "boom".into(),
                });
            }
            if self.empty.contains(region) {
                return Ok(vec![]);
            }
            Ok(vec![feature(&format!("L{}", region))])
        }
    }

    fn regions(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn ttl() -> Duration {
        Duration::from_secs(300)
    }

    #[test]
    fn test_state_with_overlapping_passes() {
        let sync = MarkerSync::new(Arc::new(ScriptedFetcher::default()), ttl());
        assert_eq!(sync.state(), SyncState::Idle);

        // Pass A is diffing while pass B runs to completion.
        sync.begin_pass();
        sync.begin_pass();
        sync.finish_diff();
        assert_eq!(sync.state(), SyncState::ComputingDiff);
        sync.end_pass();
        assert_eq!(sync.state(), SyncState::ComputingDiff);

        sync.finish_diff();
        assert_eq!(sync.state(), SyncState::Fetching);
        sync.end_pass();
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_evicts_fetches_and_leaves_untouched() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let sync = MarkerSync::new(fetcher.clone(), ttl());

        sync.sync(&regions(&["001", "002"])).await;
        assert_eq!(sync.regions(), regions(&["001", "002"]));

        let report = sync.sync(&regions(&["002", "003"])).await;

        assert_eq!(report.removed, regions(&["001"]));
        assert_eq!(report.added, regions(&["003"]));
        assert_eq!(sync.regions(), regions(&["002", "003"]));
        assert_eq!(fetcher.calls("002"), 1);
        assert_eq!(fetcher.calls("001"), 1);
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_cache_after_pass_is_previous_minus_removed_plus_added() {
        let fetcher = Arc::new(ScriptedFetcher {
            failing: ["005".to_string()].into_iter().collect(),
            empty: ["006".to_string()].into_iter().collect(),
            ..ScriptedFetcher::default()
        });
        let sync = MarkerSync::new(fetcher, ttl());

        sync.sync(&regions(&["001", "002", "003"])).await;
        let before: BTreeSet<String> = sync.regions().into_iter().collect();

        let report = sync.sync(&regions(&["002", "004", "005", "006"])).await;
        let after: BTreeSet<String> = sync.regions().into_iter().collect();

        let mut expected = before.clone();
        for r in &report.removed {
            expected.remove(r);
        }
        expected.extend(report.added.iter().cloned());

        assert_eq!(after, expected);
        assert_eq!(report.failed, regions(&["005"]));
        assert_eq!(report.empty, regions(&["006"]));
    }

    #[tokio::test]
    async fn test_empty_region_never_cached() {
        let fetcher = Arc::new(ScriptedFetcher {
            empty: ["009".to_string()].into_iter().collect(),
            ..ScriptedFetcher::default()
        });
        let sync = MarkerSync::new(fetcher, ttl());

        let report = sync.sync(&regions(&["009"])).await;
        assert_eq!(report.empty, regions(&["009"]));
        assert!(!sync.contains_region("009"));
        assert!(sync.markers().is_empty());
    }

    #[tokio::test]
    async fn test_failed_and_empty_regions_not_refetched_within_ttl() {
        let fetcher = Arc::new(ScriptedFetcher {
            empty: ["001".to_string()].into_iter().collect(),
            failing: ["002".to_string()].into_iter().collect(),
            ..ScriptedFetcher::default()
        });
        let sync = MarkerSync::new(fetcher.clone(), ttl());

        sync.sync(&regions(&["001", "002"])).await;
        let report = sync.sync(&regions(&["001", "002"])).await;

        assert_eq!(report.skipped, regions(&["001", "002"]));
        assert_eq!(fetcher.calls("001"), 1);
        assert_eq!(fetcher.calls("002"), 1);
    }

    #[tokio::test]
    async fn test_failed_region_retried_after_ttl() {
        let fetcher = Arc::new(ScriptedFetcher {
            failing: ["002".to_string()].into_iter().collect(),
            ..ScriptedFetcher::default()
        });
        let sync = MarkerSync::new(fetcher.clone(), Duration::ZERO);

        sync.sync(&regions(&["002"])).await;
        sync.sync(&regions(&["002"])).await;

        assert_eq!(fetcher.calls("002"), 2);
    }

    #[tokio::test]
    async fn test_result_for_region_that_left_view_is_discarded() {
        let notify = Arc::new(Notify::new());
        let fetcher = Arc::new(ScriptedFetcher {
            gated: Some(("001".to_string(), notify.clone())),
            ..ScriptedFetcher::default()
        });
        let sync = Arc::new(MarkerSync::new(fetcher.clone(), ttl()));

        let first = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.sync(&regions(&["001"])).await })
        };
        while sync.in_flight_regions().is_empty() {
            tokio::task::yield_now().await;
        }

        // The user pans away before 001 comes back.
        let second = sync.sync(&regions(&["002"])).await;
        assert_eq!(second.added, regions(&["002"]));

        notify.notify_one();
        let first = first.await.expect("first pass should finish");

        assert_eq!(first.stale, regions(&["001"]));
        assert!(first.added.is_empty());
        assert_eq!(sync.regions(), regions(&["002"]));
        assert_eq!(sync.generation(), 2);
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_region_in_flight_is_not_fetched_twice() {
        let notify = Arc::new(Notify::new());
        let fetcher = Arc::new(ScriptedFetcher {
            gated: Some(("001".to_string(), notify.clone())),
            ..ScriptedFetcher::default()
        });
        let sync = Arc::new(MarkerSync::new(fetcher.clone(), ttl()));

        let first = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.sync(&regions(&["001"])).await })
        };
        while sync.in_flight_regions().is_empty() {
            tokio::task::yield_now().await;
        }

        // Small pan: 001 still visible, 002 newly visible.
        let second = sync.sync(&regions(&["001", "002"])).await;
        assert_eq!(second.skipped, regions(&["001"]));
        assert_eq!(sync.state(), SyncState::Fetching);

        notify.notify_one();
        let first = first.await.expect("first pass should finish");

        assert_eq!(first.added, regions(&["001"]));
        assert_eq!(fetcher.calls("001"), 1);
        assert_eq!(sync.regions(), regions(&["001", "002"]));
    }
}
