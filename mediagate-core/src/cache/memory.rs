//! In-memory derived-image cache
//!
//! Keeps generated renditions in an LRU keyed by storage key. Useful for
//! single-node deployments and tests; contents do not survive a restart.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use super::{CacheError, CacheResolution, DerivedImageCache, StorageKey};
use crate::request::MediaRequest;
use crate::response::{ContentResponse, MediaResponse};

const DEFAULT_CAPACITY: usize = 256;

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStatistics {
    pub entries: usize,
    pub capacity: usize,
    pub total_size: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
}

impl CacheStatistics {
    /// Fraction of lookups answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// LRU cache of generated renditions.
pub struct MemoryImageCache {
    entries: Arc<RwLock<LruCache<StorageKey, ContentResponse>>>,
    stats: Arc<RwLock<CacheStatistics>>,
}

impl MemoryImageCache {
    /// Creates a cache holding at most `max_entries` renditions.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries)
            .or(NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);

        Self {
            entries: Arc::new(RwLock::new(LruCache::new(capacity))),
            stats: Arc::new(RwLock::new(CacheStatistics {
                capacity: capacity.get(),
                ..CacheStatistics::default()
            })),
        }
    }

    /// Current statistics.
    pub async fn statistics(&self) -> CacheStatistics {
        let entries = self.entries.read().await;
        let mut stats = self.stats.read().await.clone();
        stats.entries = entries.len();
        stats.total_size = entries.iter().map(|(_, entry)| entry.body.len()).sum();
        stats
    }
}

impl Default for MemoryImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl DerivedImageCache for MemoryImageCache {
    async fn resolve(
        &self,
        _request: &MediaRequest,
        path: &str,
        filter: &str,
    ) -> Result<CacheResolution, CacheError> {
        let key = StorageKey::for_filter(path, filter);
        let mut entries = self.entries.write().await;

        if let Some(entry) = entries.get(&key) {
            self.stats.write().await.hit_count += 1;
            tracing::debug!("Memory cache hit for {} ({} bytes)", key, entry.body.len());
            return Ok(CacheResolution::Hit(MediaResponse::Content(entry.clone())));
        }

        self.stats.write().await.miss_count += 1;
        tracing::debug!("Memory cache miss for {}", key);
        Ok(CacheResolution::Miss(Some(key)))
    }

    async fn store(
        &self,
        response: MediaResponse,
        key: &StorageKey,
        _filter: &str,
    ) -> Result<MediaResponse, CacheError> {
        if let MediaResponse::Content(content) = &response
            && content.status == 200
        {
            let mut entries = self.entries.write().await;
            if let Some((evicted, _)) = entries.push(key.clone(), content.clone())
                && &evicted != key
            {
                self.stats.write().await.eviction_count += 1;
            }
        }
        Ok(response)
    }
}
