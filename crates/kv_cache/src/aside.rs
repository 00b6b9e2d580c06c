//! Cache-aside policy.
//!
//! Read the key; on a hit return the stored payload verbatim. On a miss run
//! the upstream fetch, serialize it once, store that exact string and return
//! it. Upstream errors propagate and are never stored. Store errors are
//! logged and the request continues as if the cache were empty.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::Error;
use serde::Serialize;
use tracing::{debug, warn};

use crate::KvStore;

/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

/// Serialized JSON body plus its provenance.
#[derive(Debug, Clone)]
pub struct CachedPayload {
    pub body: String,
    pub status: CacheStatus,
}

/// Expiry for stored payloads. Empty lists get the shorter `empty` TTL.
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    pub ttl: Duration,
    pub empty: Duration,
}

impl TtlPolicy {
    pub fn from_secs(ttl_secs: u64, empty_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            empty: Duration::from_secs(empty_secs),
        }
    }
}

#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn KvStore>,
}

impl CacheAside {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Serve `key` from the store, or fetch, store and serve a list.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &str,
        policy: TtlPolicy,
        fetch: F,
    ) -> Result<CachedPayload, Error>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, Error>>,
    {
        match self.store.get(key).await {
            Ok(Some(body)) => {
                debug!("Cache hit: {}", key);
                return Ok(CachedPayload {
                    body,
                    status: CacheStatus::Hit,
                });
            }
            Ok(None) => debug!("Cache miss: {}", key),
            Err(e) => warn!("Cache read failed for {}, going upstream: {}", key, e),
        }

        let items = fetch().await?;
        let ttl = if items.is_empty() { policy.empty } else { policy.ttl };
        let body = serde_json::to_string(&items)?;

        if let Err(e) = self.store.set(key, &body, ttl).await {
            warn!("Cache write failed for {}: {}", key, e);
        }

        Ok(CachedPayload {
            body,
            status: CacheStatus::Miss,
        })
    }

    /// Fetch and serialize without touching the store.
    pub async fn bypass<T, F, Fut>(&self, fetch: F) -> Result<CachedPayload, Error>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, Error>>,
    {
        let items = fetch().await?;
        Ok(CachedPayload {
            body: serde_json::to_string(&items)?,
            status: CacheStatus::Bypass,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose backend is always down.
    struct BrokenStore;

    #[async_trait]
    impl KvStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, Error> {
            Err(Error::Cache("connection refused".into()))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), Error> {
            Err(Error::Cache("connection refused".into()))
        }
        async fn ping(&self) -> Result<(), Error> {
            Err(Error::Cache("connection refused".into()))
        }
        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    fn policy() -> TtlPolicy {
        TtlPolicy::from_secs(60, 60)
    }

    #[tokio::test]
    async fn test_repeat_calls_are_byte_identical_with_one_upstream_call() {
        let cache = CacheAside::new(Arc::new(MemoryStore::new()));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(vec!["a".to_string(), "b".to_string()])
        };

        let first = cache.get_or_fetch("k", policy(), fetch).await.unwrap();
        let second = cache.get_or_fetch("k", policy(), fetch).await.unwrap();

        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(first.body, second.body);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upstream_errors_are_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheAside::new(store.clone());

        let err = cache
            .get_or_fetch("k", policy(), || async {
                Err::<Vec<String>, _>(Error::Upstream {
                    service: "eBird",
                    status: 503,
                    message: "down".into(),
                })
            })
            .await
            .unwrap_err();

        assert_eq!(err.upstream_status(), Some(503));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_empty_lists_use_empty_ttl() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheAside::new(store.clone());
        let policy = TtlPolicy {
            ttl: Duration::from_secs(60),
            empty: Duration::ZERO,
        };

        let payload = cache
            .get_or_fetch("k", policy, || async { Ok::<Vec<String>, Error>(vec![]) })
            .await
            .unwrap();
        assert_eq!(payload.body, "[]");
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_broken_store_falls_back_to_upstream() {
        let cache = CacheAside::new(Arc::new(BrokenStore));
        let payload = cache
            .get_or_fetch("k", policy(), || async { Ok::<_, Error>(vec![1, 2, 3]) })
            .await
            .unwrap();

        assert_eq!(payload.status, CacheStatus::Miss);
        assert_eq!(payload.body, "[1,2,3]");
    }

    #[tokio::test]
    async fn test_bypass_skips_store() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheAside::new(store.clone());
        let payload = cache
            .bypass(|| async { Ok::<_, Error>(vec![1]) })
            .await
            .unwrap();

        assert_eq!(payload.status, CacheStatus::Bypass);
        assert!(store.is_empty());
    }
}
