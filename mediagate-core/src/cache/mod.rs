//! Derived-image caches.
//!
//! A cache is asked first whether a filtered rendition already exists. On a
//! hit it answers with a complete response; on a miss it may hand back the
//! key under which the freshly generated rendition should be stored.
//!
//! Concurrent misses for the same key may both regenerate and both store.
//! Implementations must tolerate the duplicate write.

pub mod filesystem;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
pub use filesystem::FilesystemImageCache;
pub use memory::MemoryImageCache;

use crate::request::MediaRequest;
use crate::response::MediaResponse;

/// Errors raised by a derived-image cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Path cannot be mapped to a cache location
    #[error("Invalid cache path: {path}")]
    InvalidPath {
        /// Offending path
        path: String,
    },

    /// Underlying I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Location a derived image is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Key for a path rendered through a filter.
    pub fn for_filter(path: &str, filter: &str) -> Self {
        Self(format!("{}/{}", filter, path.trim_start_matches('/')))
    }

    /// Creates a key from its raw value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheResolution {
    /// Complete response to return as-is
    Hit(MediaResponse),
    /// Nothing cached; store the rendition under the key when one is given
    Miss(Option<StorageKey>),
}

/// Store of filter-transformed image variants.
#[async_trait]
pub trait DerivedImageCache: Send + Sync {
    /// Look up the rendition of `path` through `filter`.
    ///
    /// # Errors
    /// - `CacheError::InvalidPath` - If the path cannot be cached
    /// - `CacheError::Io` - If the backing store failed
    async fn resolve(
        &self,
        request: &MediaRequest,
        path: &str,
        filter: &str,
    ) -> Result<CacheResolution, CacheError>;

    /// Store a generated rendition and return the response to send.
    ///
    /// # Errors
    /// - `CacheError::Io` - If the backing store failed
    async fn store(
        &self,
        response: MediaResponse,
        key: &StorageKey,
        filter: &str,
    ) -> Result<MediaResponse, CacheError>;
}
