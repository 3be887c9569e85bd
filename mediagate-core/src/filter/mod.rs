//! Named image filters.
//!
//! A filter turns an image file into a rendition. Filters are declared in
//! configuration by name and applied by the gateway on cache misses.

pub mod manager;

use std::path::Path;

use async_trait::async_trait;
pub use manager::FilterManager;
use serde::{Deserialize, Serialize};

use crate::request::MediaRequest;
use crate::response::MediaResponse;

/// Errors raised while applying a filter.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// No filter is configured under this name
    #[error("Unknown filter: {name}")]
    UnknownFilter {
        /// Requested filter name
        name: String,
    },

    /// Source image could not be decoded or the rendition encoded
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    /// Blocking worker running the transformation died
    #[error("Filter task failed: {reason}")]
    TaskFailed {
        /// Description of the failure
        reason: String,
    },

    /// Underlying I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a thumbnail fits the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailMode {
    /// Scale down to fit inside the box, keeping the aspect ratio
    #[default]
    Inset,
    /// Scale and crop to fill the box exactly
    Outbound,
}

/// Target box of a thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub mode: ThumbnailMode,
}

/// Encoding of the rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    /// MIME type of the encoded rendition.
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }
}

fn default_quality() -> u8 {
    85
}

/// Declarative description of a named filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDefinition {
    /// Resize step, skipped when absent
    #[serde(default)]
    pub thumbnail: Option<ThumbnailSize>,
    /// Convert to grayscale after resizing
    #[serde(default)]
    pub grayscale: bool,
    /// JPEG quality, 1 to 100
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Output encoding
    #[serde(default)]
    pub format: OutputFormat,
}

impl FilterDefinition {
    /// Thumbnail filter with the default quality and JPEG output.
    pub fn thumbnail(width: u32, height: u32, mode: ThumbnailMode) -> Self {
        Self {
            thumbnail: Some(ThumbnailSize {
                width,
                height,
                mode,
            }),
            grayscale: false,
            quality: default_quality(),
            format: OutputFormat::Jpeg,
        }
    }
}

/// Applies named transformations to image files.
#[async_trait]
pub trait ImageFilter: Send + Sync {
    /// Whether a filter with this name exists.
    fn has_filter(&self, name: &str) -> bool;

    /// Apply filter `name` to the image at `image`.
    ///
    /// `path` is the public path the rendition was requested under.
    ///
    /// # Errors
    /// - `FilterError::UnknownFilter` - If no filter has that name
    /// - `FilterError::Image` - If decoding or encoding failed
    async fn apply(
        &self,
        request: &MediaRequest,
        name: &str,
        image: &Path,
        path: &str,
    ) -> Result<MediaResponse, FilterError>;
}
