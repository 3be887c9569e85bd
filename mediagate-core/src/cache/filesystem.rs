//! Filesystem-backed derived-image cache.
//!
//! Renditions are written to `{root}/{filter}/{path}` and served statically
//! by the web layer under `{url_prefix}`. A hit redirects the client there.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{CacheError, CacheResolution, DerivedImageCache, StorageKey};
use crate::request::MediaRequest;
use crate::response::{MediaResponse, RedirectResponse};

/// Cache storing renditions as files.
#[derive(Debug, Clone)]
pub struct FilesystemImageCache {
    root: PathBuf,
    url_prefix: String,
}

impl FilesystemImageCache {
    /// Creates a cache writing under `root`, published under `url_prefix`.
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        let url_prefix = url_prefix.into();
        Self {
            root: root.into(),
            url_prefix: format!("/{}", url_prefix.trim_matches('/')),
        }
    }

    /// Cache root on disk.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// URL prefix the root is published under.
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// On-disk location of a key.
    ///
    /// # Errors
    /// - `CacheError::InvalidPath` - If the key would escape the root
    pub fn location(&self, key: &StorageKey) -> Result<PathBuf, CacheError> {
        let relative = Path::new(key.as_str());
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(CacheError::InvalidPath {
                path: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DerivedImageCache for FilesystemImageCache {
    async fn resolve(
        &self,
        request: &MediaRequest,
        path: &str,
        filter: &str,
    ) -> Result<CacheResolution, CacheError> {
        let key = StorageKey::for_filter(path, filter);
        let location = self.location(&key)?;

        if tokio::fs::try_exists(&location).await? {
            let url = format!("{}{}/{}", request.base_url, self.url_prefix, key);
            debug!("Cache hit for {} through {}, redirecting to {}", path, filter, url);
            return Ok(CacheResolution::Hit(MediaResponse::Redirect(
                RedirectResponse::permanent(url),
            )));
        }

        debug!("Cache miss for {} through {}", path, filter);
        Ok(CacheResolution::Miss(Some(key)))
    }

    async fn store(
        &self,
        response: MediaResponse,
        key: &StorageKey,
        filter: &str,
    ) -> Result<MediaResponse, CacheError> {
        let MediaResponse::Content(content) = &response else {
            warn!(
                "Not caching {} response for {} ({})",
                response.status(),
                key,
                filter
            );
            return Ok(response);
        };
        if content.status != 200 {
            return Ok(response);
        }

        let location = self.location(key)?;
        let body = content.body.clone();

        // Write beside the target and rename, so readers never see a partial file
        tokio::task::spawn_blocking(move || -> Result<(), std::io::Error> {
            let parent = location
                .parent()
                .ok_or_else(|| std::io::Error::other("cache location has no parent"))?;
            std::fs::create_dir_all(parent)?;
            let mut staged = tempfile::Builder::new()
                .prefix(".mediagate-store")
                .tempfile_in(parent)?;
            staged.write_all(&body)?;
            staged.persist(&location).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!("Stored {} bytes under {}", content.body.len(), key);
        Ok(response)
    }
}
