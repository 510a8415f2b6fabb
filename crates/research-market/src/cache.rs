//! Caching layer for market snapshots to reduce API calls

use crate::snapshot::FinancialSnapshot;
use cached::{Cached, TimedCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Thread-safe TTL cache of snapshots keyed by upper-cased symbol
#[derive(Clone)]
pub struct SnapshotCache {
    cache: Arc<RwLock<TimedCache<String, FinancialSnapshot>>>,
}

impl SnapshotCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Get a value from the cache
    pub async fn get(&self, symbol: &str) -> Option<FinancialSnapshot> {
        let mut cache = self.cache.write().await;
        cache.cache_get(&symbol.to_ascii_uppercase()).cloned()
    }

    /// Insert a value into the cache
    pub async fn insert(&self, snapshot: FinancialSnapshot) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(snapshot.symbol.to_ascii_uppercase(), snapshot);
    }

    /// Get or fetch a snapshot using the provided fetcher function
    ///
    /// Only successful fetches are cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, symbol: &str, fetcher: F) -> Result<FinancialSnapshot, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<FinancialSnapshot, E>>,
    {
        if let Some(value) = self.get(symbol).await {
            tracing::debug!("Cache hit for {}", symbol);
            return Ok(value);
        }

        tracing::debug!("Cache miss for {}", symbol);
        let value = fetcher().await?;
        self.insert(value.clone()).await;
        Ok(value)
    }

    /// Invalidate a specific cache entry
    pub async fn invalidate(&self, symbol: &str) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_remove(&symbol.to_ascii_uppercase());
    }

    /// Get the number of cached entries
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
