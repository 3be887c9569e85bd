//! Media gateway: lookup, authorization and response generation.
//!
//! The gateway owns no mutable state. It is shared across request handlers
//! behind an `Arc` and delegates every decision to its collaborators.

pub mod filter_path;
pub mod view;


use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use filter_path::FilterPath;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
pub use view::MediaView;

use crate::cache::{CacheError, CacheResolution, DerivedImageCache};
use crate::filter::{FilterError, ImageFilter};
use crate::media::{Format, Media, MediaId};
use crate::provider::{ProviderError, ProviderRegistry, ReferenceFile};
use crate::repository::{MediaRepository, RepositoryError};
use crate::request::MediaRequest;
use crate::response::MediaResponse;
use crate::security::AuthorizationError;

/// Prefix of the temporary files handed to filters.
pub const TEMP_FILE_PREFIX: &str = "mediagate_filter";

/// Coarse classification used to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 404
    NotFound,
    /// 403
    Forbidden,
    /// 500
    CollaboratorFailure,
}

/// Errors returned by gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Not found: {reason}")]
    NotFound { reason: String },

    #[error("Access to media {media_id} denied")]
    Forbidden { media_id: MediaId },

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Classification of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::NotFound { .. } => ErrorKind::NotFound,
            GatewayError::Forbidden { .. } => ErrorKind::Forbidden,
            _ => ErrorKind::CollaboratorFailure,
        }
    }

    fn not_found(reason: impl Into<String>) -> Self {
        GatewayError::NotFound {
            reason: reason.into(),
        }
    }
}

/// Orchestrates download, view and filtered-image requests.
pub struct MediaGateway {
    repository: Arc<dyn MediaRepository>,
    registry: Arc<dyn ProviderRegistry>,
    cache: Arc<dyn DerivedImageCache>,
    filters: Arc<dyn ImageFilter>,
    temp_dir: PathBuf,
}

impl MediaGateway {
    /// Creates a gateway writing temporary files to the system temp directory.
    pub fn new(
        repository: Arc<dyn MediaRepository>,
        registry: Arc<dyn ProviderRegistry>,
        cache: Arc<dyn DerivedImageCache>,
        filters: Arc<dyn ImageFilter>,
    ) -> Self {
        Self {
            repository,
            registry,
            cache,
            filters,
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Sets the directory temporary files are created in.
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// Directory temporary files are created in.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Download a format of a media.
    ///
    /// File-backed responses are prepared against the request before they
    /// are returned.
    ///
    /// # Errors
    /// - `GatewayError::NotFound` - If the media does not exist
    /// - `GatewayError::Forbidden` - If the context's strategy denies the request
    /// - `GatewayError::Provider` - If the provider cannot produce a response
    pub async fn download(
        &self,
        request: &MediaRequest,
        id: &MediaId,
        format: &Format,
    ) -> Result<MediaResponse, GatewayError> {
        let media = self.find_media(id).await?;
        self.authorize(&media, request)?;

        let provider = self.registry.provider(&media.provider_name)?;
        let mode = self.registry.download_mode(&media);
        let mut response = provider.download_response(&media, format, mode).await?;

        if let MediaResponse::File(file) = &mut response {
            file.prepare(request).await?;
        }

        info!(
            "Download of media {} as {} ({}) answered with {}",
            media.id,
            format,
            mode,
            response.status()
        );
        Ok(response)
    }

    /// Describe a media and the formats available for it.
    ///
    /// # Errors
    /// - `GatewayError::NotFound` - If the media does not exist
    /// - `GatewayError::Forbidden` - If the context's strategy denies the request
    pub async fn view(
        &self,
        request: &MediaRequest,
        id: &MediaId,
        format: &Format,
    ) -> Result<MediaView, GatewayError> {
        let media = self.find_media(id).await?;
        self.authorize(&media, request)?;

        let formats = self.registry.format_names(&media.context);
        debug!("View of media {} lists {} formats", media.id, formats.len());

        Ok(MediaView {
            media,
            formats,
            format: format.clone(),
        })
    }

    /// Serve `path` rendered through `filter`, generating it on a cache miss.
    ///
    /// Derived images are public: no download strategy is consulted.
    ///
    /// # Errors
    /// - `GatewayError::NotFound` - If the path does not follow the grammar,
    ///   the filter is unknown, or the media does not exist
    /// - `GatewayError::Cache` - If the cache failed to resolve or store
    /// - `GatewayError::Filter` - If the rendition could not be produced
    pub async fn serve_filtered_image(
        &self,
        request: &MediaRequest,
        path: &str,
        filter: &str,
    ) -> Result<MediaResponse, GatewayError> {
        let parsed = FilterPath::parse(path)
            .ok_or_else(|| GatewayError::not_found(format!("no filtered image at {path}")))?;
        if !self.filters.has_filter(filter) {
            return Err(GatewayError::not_found(format!("unknown filter {filter}")));
        }

        let storage_key = match self.cache.resolve(request, path, filter).await? {
            CacheResolution::Hit(response) => return Ok(response),
            CacheResolution::Miss(key) => key,
        };

        let media = self.find_media(&parsed.media_id).await?;
        let provider = self.registry.provider(&media.provider_name)?;
        let reference = provider.reference_file(&media).await?;

        let temp_file = self.materialize(reference).await?;
        let generated = self
            .filters
            .apply(request, filter, temp_file.path(), path)
            .await;
        release(temp_file);
        let response = generated?;

        match storage_key {
            Some(key) => {
                debug!("Storing {} through {} under {}", path, filter, key);
                Ok(self.cache.store(response, &key, filter).await?)
            }
            None => Ok(response),
        }
    }

    async fn find_media(&self, id: &MediaId) -> Result<Media, GatewayError> {
        self.repository
            .find(id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("media {id}")))
    }

    fn authorize(&self, media: &Media, request: &MediaRequest) -> Result<(), GatewayError> {
        let strategy = self.registry.download_strategy(media)?;
        if strategy.is_granted(media, request)? {
            return Ok(());
        }

        info!(
            "Denied media {} in context {}: {}",
            media.id,
            media.context,
            strategy.description()
        );
        Err(GatewayError::Forbidden {
            media_id: media.id.clone(),
        })
    }

    /// Write a reference file to a uniquely named temporary file.
    ///
    /// The file is deleted when the returned handle is dropped.
    async fn materialize(&self, reference: ReferenceFile) -> Result<NamedTempFile, GatewayError> {
        let temp_dir = self.temp_dir.clone();
        let suffix = if reference.extension.is_empty() {
            String::new()
        } else {
            format!(".{}", reference.extension)
        };

        let file = tokio::task::spawn_blocking(move || -> Result<NamedTempFile, std::io::Error> {
            std::fs::create_dir_all(&temp_dir)?;
            let mut file = tempfile::Builder::new()
                .prefix(TEMP_FILE_PREFIX)
                .suffix(&suffix)
                .tempfile_in(&temp_dir)?;
            file.write_all(&reference.content)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!("Materialized reference file at {}", file.path().display());
        Ok(file)
    }
}

fn release(temp_file: NamedTempFile) {
    let path = temp_file.path().to_path_buf();
    if let Err(e) = temp_file.close() {
        warn!("Failed to remove temporary file {}: {}", path.display(), e);
    }
}
