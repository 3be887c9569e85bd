//! Test fixtures for gateway testing.
//!
//! Recording collaborators count and capture every call so tests can assert
//! what the gateway did and, more often, what it did not do.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::cache::{CacheError, CacheResolution, DerivedImageCache, StorageKey};
use crate::filter::{FilterError, ImageFilter};
use crate::gateway::{MediaGateway, TEMP_FILE_PREFIX};
use crate::media::{DownloadMode, Format, Media};
use crate::provider::{MediaContext, MediaProvider, ProviderError, ProviderPool, ReferenceFile};
use crate::repository::InMemoryMediaRepository;
use crate::request::MediaRequest;
use crate::response::{ContentResponse, MediaResponse};
use crate::security::DownloadStrategy;

/// Context every sample media belongs to.
pub const SAMPLE_CONTEXT: &str = "default";

/// Provider name every sample media uses.
pub const SAMPLE_PROVIDER: &str = "image";

/// Bytes of the reference file served by [`RecordingProvider`].
pub const SAMPLE_REFERENCE: &[u8] = b"reference bytes";

/// Media record with a JPEG reference in the sample context.
pub fn sample_media(id: u64) -> Media {
    Media::new(
        id,
        SAMPLE_PROVIDER,
        SAMPLE_CONTEXT,
        format!("{SAMPLE_CONTEXT}/{id}.jpg"),
    )
}

/// Provider counting its calls.
pub struct RecordingProvider {
    response: MediaResponse,
    download_calls: AtomicUsize,
    reference_calls: AtomicUsize,
}

impl RecordingProvider {
    /// Provider answering downloads with a small in-memory body.
    pub fn new() -> Self {
        Self::with_response(MediaResponse::Content(ContentResponse::ok(
            "image/jpeg",
            Bytes::from_static(b"download"),
        )))
    }

    /// Provider answering downloads with `response`.
    pub fn with_response(response: MediaResponse) -> Self {
        Self {
            response,
            download_calls: AtomicUsize::new(0),
            reference_calls: AtomicUsize::new(0),
        }
    }

    /// Number of download responses produced.
    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    /// Number of reference files handed out.
    pub fn reference_calls(&self) -> usize {
        self.reference_calls.load(Ordering::SeqCst)
    }

    /// Total number of calls of any kind.
    pub fn calls(&self) -> usize {
        self.download_calls() + self.reference_calls()
    }
}

impl Default for RecordingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaProvider for RecordingProvider {
    async fn download_response(
        &self,
        _media: &Media,
        _format: &Format,
        _mode: DownloadMode,
    ) -> Result<MediaResponse, ProviderError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }

    async fn reference_file(&self, media: &Media) -> Result<ReferenceFile, ProviderError> {
        self.reference_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ReferenceFile {
            content: Bytes::from_static(SAMPLE_REFERENCE),
            extension: media.extension.clone(),
        })
    }
}

/// One call to [`DerivedImageCache::store`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRendition {
    pub key: StorageKey,
    pub filter: String,
    pub response: MediaResponse,
}

/// Cache answering every lookup with a canned resolution.
pub struct RecordingCache {
    /// `None` makes every lookup fail
    resolution: Option<CacheResolution>,
    resolve_calls: AtomicUsize,
    stored: Mutex<Vec<StoredRendition>>,
}

impl RecordingCache {
    /// Cache that always hits with `response`.
    pub fn hit(response: MediaResponse) -> Self {
        Self::with_resolution(CacheResolution::Hit(response))
    }

    /// Cache that always misses, handing out `key`.
    pub fn miss(key: Option<StorageKey>) -> Self {
        Self::with_resolution(CacheResolution::Miss(key))
    }

    /// Cache whose lookups fail with an I/O error.
    pub fn failing() -> Self {
        Self {
            resolution: None,
            resolve_calls: AtomicUsize::new(0),
            stored: Mutex::new(Vec::new()),
        }
    }

    fn with_resolution(resolution: CacheResolution) -> Self {
        Self {
            resolution: Some(resolution),
            resolve_calls: AtomicUsize::new(0),
            stored: Mutex::new(Vec::new()),
        }
    }

    /// Number of lookups.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    /// Every stored rendition, in call order.
    pub fn stored(&self) -> Vec<StoredRendition> {
        self.stored.lock().clone()
    }
}

#[async_trait]
impl DerivedImageCache for RecordingCache {
    async fn resolve(
        &self,
        _request: &MediaRequest,
        _path: &str,
        _filter: &str,
    ) -> Result<CacheResolution, CacheError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.resolution
            .clone()
            .ok_or_else(|| CacheError::Io(std::io::Error::other("cache backend offline")))
    }

    async fn store(
        &self,
        response: MediaResponse,
        key: &StorageKey,
        filter: &str,
    ) -> Result<MediaResponse, CacheError> {
        self.stored.lock().push(StoredRendition {
            key: key.clone(),
            filter: filter.to_string(),
            response: response.clone(),
        });
        Ok(response)
    }
}

/// What a filter saw when it was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedFilter {
    pub name: String,
    pub image: PathBuf,
    pub path: String,
    /// Image content read while the filter ran
    pub content: Vec<u8>,
}

/// Filter echoing its input, optionally failing after reading it.
pub struct RecordingFilter {
    names: Vec<String>,
    fail: bool,
    applied: Mutex<Vec<AppliedFilter>>,
}

impl RecordingFilter {
    /// Filter knowing the given names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            fail: false,
            applied: Mutex::new(Vec::new()),
        }
    }

    /// Fails every application after recording it.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Every application, in call order.
    pub fn applied(&self) -> Vec<AppliedFilter> {
        self.applied.lock().clone()
    }

    /// Body returned for a rendition of `name`.
    pub fn rendition(name: &str) -> MediaResponse {
        MediaResponse::Content(ContentResponse::ok(
            "image/jpeg",
            format!("rendered by {name}"),
        ))
    }
}

#[async_trait]
impl ImageFilter for RecordingFilter {
    fn has_filter(&self, name: &str) -> bool {
        self.names.iter().any(|known| known == name)
    }

    async fn apply(
        &self,
        _request: &MediaRequest,
        name: &str,
        image: &std::path::Path,
        path: &str,
    ) -> Result<MediaResponse, FilterError> {
        let content = tokio::fs::read(image).await?;
        self.applied.lock().push(AppliedFilter {
            name: name.to_string(),
            image: image.to_path_buf(),
            path: path.to_string(),
            content,
        });

        if self.fail {
            return Err(FilterError::TaskFailed {
                reason: "simulated filter failure".to_string(),
            });
        }
        Ok(Self::rendition(name))
    }
}

/// Gateway wired to recording collaborators.
///
/// The repository holds `sample_media(5)`; its context uses the given
/// strategy and the formats `small` and `big`.
pub struct GatewayFixture {
    pub gateway: MediaGateway,
    pub provider: Arc<RecordingProvider>,
    pub cache: Arc<RecordingCache>,
    pub filter: Arc<RecordingFilter>,
    pub temp_dir: tempfile::TempDir,
}

impl GatewayFixture {
    /// Builds the fixture.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    pub fn new(
        strategy: Arc<dyn DownloadStrategy>,
        cache: RecordingCache,
        filter: RecordingFilter,
    ) -> Self {
        Self::with_provider(strategy, cache, filter, RecordingProvider::new())
    }

    /// Builds the fixture around a specific provider.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    pub fn with_provider(
        strategy: Arc<dyn DownloadStrategy>,
        cache: RecordingCache,
        filter: RecordingFilter,
        provider: RecordingProvider,
    ) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(provider);
        let cache = Arc::new(cache);
        let filter = Arc::new(filter);

        let mut pool = ProviderPool::new();
        pool.add_provider(SAMPLE_PROVIDER, provider.clone());
        pool.add_context(
            SAMPLE_CONTEXT,
            MediaContext::new(SAMPLE_CONTEXT, ["small", "big"], strategy, DownloadMode::Http),
        );

        let gateway = MediaGateway::new(
            Arc::new(InMemoryMediaRepository::with_media([sample_media(5)])),
            Arc::new(pool),
            cache.clone(),
            filter.clone(),
        )
        .with_temp_dir(temp_dir.path());

        Self {
            gateway,
            provider,
            cache,
            filter,
            temp_dir,
        }
    }

    /// Temporary files the gateway left behind.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be read.
    pub fn leftover_temp_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.temp_dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(TEMP_FILE_PREFIX))
            })
            .collect()
    }
}
