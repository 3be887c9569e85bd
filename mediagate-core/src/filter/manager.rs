//! Filter manager backed by the `image` crate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use tracing::debug;

use super::{FilterDefinition, FilterError, ImageFilter, OutputFormat, ThumbnailMode};
use crate::request::MediaRequest;
use crate::response::{ContentResponse, MediaResponse};

/// Named filters applied on a blocking worker thread.
#[derive(Debug, Clone, Default)]
pub struct FilterManager {
    filters: BTreeMap<String, FilterDefinition>,
}

impl FilterManager {
    /// Creates a manager from named definitions.
    pub fn new(filters: BTreeMap<String, FilterDefinition>) -> Self {
        Self { filters }
    }

    /// Adds or replaces a filter.
    pub fn insert(&mut self, name: impl Into<String>, definition: FilterDefinition) {
        self.filters.insert(name.into(), definition);
    }

    /// Names of the configured filters, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }
}

/// Decode, transform and encode one image.
fn render(source: &Path, definition: &FilterDefinition) -> Result<Vec<u8>, FilterError> {
    let mut image = ImageReader::open(source)?.with_guessed_format()?.decode()?;

    if let Some(size) = definition.thumbnail {
        image = match size.mode {
            ThumbnailMode::Inset
                if image.width() <= size.width && image.height() <= size.height =>
            {
                image
            }
            ThumbnailMode::Inset => image.thumbnail(size.width, size.height),
            ThumbnailMode::Outbound => {
                image.resize_to_fill(size.width, size.height, FilterType::Lanczos3)
            }
        };
    }

    if definition.grayscale {
        image = image.grayscale();
    }

    let mut buffer = Vec::new();
    match definition.format {
        OutputFormat::Jpeg => {
            let flattened = if definition.grayscale {
                DynamicImage::ImageLuma8(image.to_luma8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            };
            let encoder =
                JpegEncoder::new_with_quality(&mut buffer, definition.quality.clamp(1, 100));
            flattened.write_with_encoder(encoder)?;
        }
        OutputFormat::Png => {
            image.write_with_encoder(PngEncoder::new(&mut buffer))?;
        }
    }

    Ok(buffer)
}

#[async_trait]
impl ImageFilter for FilterManager {
    fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    async fn apply(
        &self,
        _request: &MediaRequest,
        name: &str,
        image: &Path,
        path: &str,
    ) -> Result<MediaResponse, FilterError> {
        let definition = self
            .filters
            .get(name)
            .cloned()
            .ok_or_else(|| FilterError::UnknownFilter {
                name: name.to_string(),
            })?;
        let content_type = definition.format.content_type();
        let source: PathBuf = image.to_path_buf();

        let body = tokio::task::spawn_blocking(move || render(&source, &definition))
            .await
            .map_err(|e| FilterError::TaskFailed {
                reason: e.to_string(),
            })??;

        debug!("Filter {} rendered {} ({} bytes)", name, path, body.len());
        Ok(MediaResponse::Content(ContentResponse::ok(content_type, body)))
    }
}

#[cfg(test)]
mod tests {
    use image::{GenericImageView, ImageFormat, Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;

    fn write_png(dir: &TempDir, width: u32, height: u32) -> PathBuf {
        let path = dir.path().join("source.png");
        RgbImage::from_pixel(width, height, Rgb([200, 40, 40]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    fn decoded(response: &MediaResponse) -> DynamicImage {
        let MediaResponse::Content(content) = response else {
            panic!("expected content response");
        };
        image::load_from_memory(&content.body).unwrap()
    }

    fn manager() -> FilterManager {
        let mut manager = FilterManager::default();
        manager.insert("small", FilterDefinition::thumbnail(40, 30, ThumbnailMode::Outbound));
        manager.insert("big", FilterDefinition::thumbnail(500, 500, ThumbnailMode::Inset));
        manager
    }

    #[tokio::test]
    async fn test_outbound_thumbnail_fills_box() {
        let dir = TempDir::new().unwrap();
        let source = write_png(&dir, 200, 100);

        let response = manager()
            .apply(&MediaRequest::new(), "small", &source, "a/b/1_small.jpg")
            .await
            .unwrap();

        assert_eq!(decoded(&response).dimensions(), (40, 30));
        let MediaResponse::Content(content) = response else {
            unreachable!()
        };
        assert_eq!(content.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_inset_thumbnail_never_upscales() {
        let dir = TempDir::new().unwrap();
        let source = write_png(&dir, 120, 80);

        let response = manager()
            .apply(&MediaRequest::new(), "big", &source, "a/b/1_big.jpg")
            .await
            .unwrap();

        assert_eq!(decoded(&response).dimensions(), (120, 80));
    }

    #[tokio::test]
    async fn test_grayscale_png_output() {
        let dir = TempDir::new().unwrap();
        let source = write_png(&dir, 10, 10);
        let mut manager = FilterManager::default();
        manager.insert(
            "mono",
            FilterDefinition {
                thumbnail: None,
                grayscale: true,
                quality: 90,
                format: OutputFormat::Png,
            },
        );

        let response = manager
            .apply(&MediaRequest::new(), "mono", &source, "a/b/1_mono.jpg")
            .await
            .unwrap();

        let pixel = decoded(&response).to_rgb8().get_pixel(0, 0).0;
        assert_eq!(pixel[0], pixel[1]);
        assert_eq!(pixel[1], pixel[2]);
    }

    #[tokio::test]
    async fn test_unknown_filter() {
        let dir = TempDir::new().unwrap();
        let source = write_png(&dir, 10, 10);

        assert!(!manager().has_filter("huge"));
        let result = manager()
            .apply(&MediaRequest::new(), "huge", &source, "a/b/1_huge.jpg")
            .await;
        assert!(matches!(result, Err(FilterError::UnknownFilter { .. })));
    }

    #[tokio::test]
    async fn test_corrupt_source_is_an_image_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.jpg");
        std::fs::write(&source, b"definitely not a jpeg").unwrap();

        let result = manager()
            .apply(&MediaRequest::new(), "small", &source, "a/b/1_small.jpg")
            .await;
        assert!(matches!(result, Err(FilterError::Image(_))));
    }
}
