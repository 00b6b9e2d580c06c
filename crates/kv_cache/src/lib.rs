//! Key-value cache used by the proxy endpoints.
//!
//! Stores are string → string with a per-entry TTL. [`CacheAside`] layers
//! the read-through / write-through policy on top of any [`KvStore`].

pub mod aside;
pub mod memory;
pub mod upstash;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::config::{CacheBackend, CacheConfig};
use common::Error;
use tracing::debug;

pub use aside::{CacheAside, CacheStatus, CachedPayload, TtlPolicy};
pub use memory::MemoryStore;
pub use upstash::UpstashStore;

/// Minimal get/set-with-expiry store.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error>;

    /// Cheap liveness check.
    async fn ping(&self) -> Result<(), Error>;

    fn backend_name(&self) -> &'static str;
}

/// Store that never holds anything.
#[derive(Debug, Clone, Default)]
pub struct NoopStore;

#[async_trait]
impl KvStore for NoopStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, Error> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), Error> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), Error> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "disabled"
    }
}

/// Cache key for a region's hotspot listing.
pub fn region_hotspots_key(region_code: &str) -> String {
    format!("region-hotspots-{region_code}")
}

/// Cache key for a location's recent observations.
pub fn location_observations_key(loc_id: &str) -> String {
    format!("location-observations-{loc_id}")
}

/// Build the store selected in config.
/// How often the in-memory backend sweeps expired keys: the shortest TTL, at least 1s.
pub fn memory_purge_interval(config: &CacheConfig) -> Duration {
    let shortest = config
        .empty_ttl_secs
        .min(config.observation_ttl_secs)
        .min(config.hotspot_ttl_secs);
    Duration::from_secs(shortest.max(1))
}

pub fn store_from_config(config: &CacheConfig) -> Result<Arc<dyn KvStore>, Error> {
    let store: Arc<dyn KvStore> = match config.backend {
        CacheBackend::Upstash => Arc::new(UpstashStore::new(&config.upstash_url, &config.upstash_token)?),
        CacheBackend::Memory => {
            let store = MemoryStore::new();
            // Outside a runtime (tests, tooling) expired keys still drop on read.
            if tokio::runtime::Handle::try_current().is_ok() {
                let every = memory_purge_interval(config);
                store.spawn_purge_task(every);
                debug!("Memory cache purge every {}s", every.as_secs());
            }
            Arc::new(store)
        }
        CacheBackend::Disabled => Arc::new(NoopStore),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(region_hotspots_key("US-WA-033"), "region-hotspots-US-WA-033");
        assert_eq!(location_observations_key("L162766"), "location-observations-L162766");
    }

    #[test]
    fn test_memory_purge_interval() {
        let mut config = CacheConfig::default();
        assert_eq!(memory_purge_interval(&config), Duration::from_secs(300));

        config.empty_ttl_secs = 0;
        assert_eq!(memory_purge_interval(&config), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_memory_store_from_config_inside_runtime() {
        let store = store_from_config(&CacheConfig::default()).unwrap();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_store_from_config() {
        let mut config = CacheConfig::default();
        assert_eq!(store_from_config(&config).unwrap().backend_name(), "memory");

        config.backend = CacheBackend::Disabled;
        assert_eq!(store_from_config(&config).unwrap().backend_name(), "disabled");

        config.backend = CacheBackend::Upstash;
        assert!(store_from_config(&config).is_err());

        config.upstash_url = "https://example.upstash.io".into();
        config.upstash_token = "tok".into();
        assert_eq!(store_from_config(&config).unwrap().backend_name(), "upstash");
    }
}
