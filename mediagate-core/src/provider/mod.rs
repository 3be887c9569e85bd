//! Media providers and the registry that selects them.
//!
//! A provider knows where the bytes of a class of media live and how to
//! hand them out. The registry maps provider names to providers and holds
//! the per-context download policy.

pub mod filesystem;
pub mod pool;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
pub use filesystem::FilesystemProvider;
pub use pool::{MediaContext, ProviderPool};

use crate::media::{DownloadMode, Format, Media};
use crate::response::MediaResponse;
use crate::security::DownloadStrategy;

/// Errors raised by providers and the registry.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Media names a provider that is not registered
    #[error("Unknown provider: {name}")]
    UnknownProvider {
        /// Provider name carried by the media
        name: String,
    },

    /// Media belongs to a context that is not configured
    #[error("Unknown context: {context}")]
    UnknownContext {
        /// Context name carried by the media
        context: String,
    },

    /// Reference points outside the provider's storage root
    #[error("Invalid media reference: {reference}")]
    InvalidReference {
        /// Offending reference
        reference: String,
    },

    /// Provider cannot deliver in the configured mode
    #[error("Provider {provider} does not support download mode {mode}")]
    UnsupportedMode {
        /// Provider name
        provider: String,
        /// Requested mode
        mode: DownloadMode,
    },

    /// Underlying I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Contents of a media's original file.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFile {
    /// File bytes
    pub content: Bytes,
    /// Extension of the original file, without the leading dot
    pub extension: String,
}

/// Produces responses and reference files for a class of media.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Build the download response for a format of a media.
    ///
    /// The provider decides between a file-backed body, a redirect, or an
    /// in-memory body.
    ///
    /// # Errors
    /// - `ProviderError::UnsupportedMode` - If the mode cannot be served
    /// - `ProviderError::InvalidReference` - If the media reference is unsafe
    async fn download_response(
        &self,
        media: &Media,
        format: &Format,
        mode: DownloadMode,
    ) -> Result<MediaResponse, ProviderError>;

    /// Load the original file of a media.
    ///
    /// # Errors
    /// - `ProviderError::Io` - If the file cannot be read
    /// - `ProviderError::InvalidReference` - If the media reference is unsafe
    async fn reference_file(&self, media: &Media) -> Result<ReferenceFile, ProviderError>;
}

/// Maps media to their provider and context policy.
pub trait ProviderRegistry: Send + Sync {
    /// Provider registered under `name`.
    ///
    /// # Errors
    /// - `ProviderError::UnknownProvider` - If no provider has that name
    fn provider(&self, name: &str) -> Result<Arc<dyn MediaProvider>, ProviderError>;

    /// Download strategy of the media's context.
    ///
    /// # Errors
    /// - `ProviderError::UnknownContext` - If the context is not configured
    fn download_strategy(&self, media: &Media) -> Result<Arc<dyn DownloadStrategy>, ProviderError>;

    /// Download mode of the media's context.
    fn download_mode(&self, media: &Media) -> DownloadMode;

    /// Format names registered for a context, in configuration order.
    fn format_names(&self, context: &str) -> Vec<String>;
}
