//! Provider serving media stored under a local directory.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use super::{MediaProvider, ProviderError, ReferenceFile};
use crate::media::{DownloadMode, Format, Media};
use crate::response::{AccelMapping, FileResponse, MediaResponse, RedirectResponse};

/// Serves reference files and pre-generated thumbnails from disk.
///
/// Layout under the root:
/// - reference files at `{media.reference}`
/// - format renditions at `{context}/thumb_{id}_{format}.jpg`
#[derive(Debug, Clone)]
pub struct FilesystemProvider {
    name: String,
    root: PathBuf,
    public_base_url: Option<String>,
    accel_mapping: AccelMapping,
}

impl FilesystemProvider {
    /// Creates a provider rooted at `root`.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            public_base_url: None,
            accel_mapping: AccelMapping::default(),
        }
    }

    /// Sets the public URL the root is exposed under, enabling redirect mode.
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Sets the path to internal URI mapping used by `X-Accel-Redirect`.
    pub fn with_accel_mapping(mut self, mapping: AccelMapping) -> Self {
        self.accel_mapping = mapping;
        self
    }

    /// Storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of a format relative to the root.
    ///
    /// # Errors
    /// - `ProviderError::InvalidReference` - If the reference escapes the root
    pub fn relative_path(&self, media: &Media, format: &Format) -> Result<PathBuf, ProviderError> {
        let relative = if format.is_reference() {
            PathBuf::from(&media.reference)
        } else {
            PathBuf::from(&media.context).join(format!("thumb_{}_{}.jpg", media.id, format))
        };

        let escapes = relative.components().any(|component| {
            !matches!(component, Component::Normal(_) | Component::CurDir)
        });
        if escapes || relative.as_os_str().is_empty() {
            return Err(ProviderError::InvalidReference {
                reference: relative.display().to_string(),
            });
        }

        Ok(relative)
    }

    fn download_name(media: &Media, format: &Format) -> String {
        if format.is_reference() {
            media.name.clone()
        } else {
            format!("{}_{}.jpg", media.id, format)
        }
    }

    fn content_type(media: &Media, path: &Path) -> String {
        if path.extension().and_then(|e| e.to_str()) == Some(media.extension.as_str()) {
            return media.content_type.clone();
        }
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

#[async_trait]
impl MediaProvider for FilesystemProvider {
    async fn download_response(
        &self,
        media: &Media,
        format: &Format,
        mode: DownloadMode,
    ) -> Result<MediaResponse, ProviderError> {
        let relative = self.relative_path(media, format)?;
        debug!(
            "Provider {} serving media {} format {} via {}",
            self.name, media.id, format, mode
        );

        if mode == DownloadMode::Redirect {
            let base = self
                .public_base_url
                .as_deref()
                .ok_or_else(|| ProviderError::UnsupportedMode {
                    provider: self.name.clone(),
                    mode,
                })?;
            let location = format!("{}/{}", base, relative.to_string_lossy().replace('\\', "/"));
            return Ok(MediaResponse::Redirect(RedirectResponse::temporary(location)));
        }

        let path = self.root.join(&relative);
        let content_type = Self::content_type(media, &path);
        let response = FileResponse::new(path, content_type)
            .with_download_name(Self::download_name(media, format));
        let response = match mode {
            DownloadMode::XSendfile => response.with_x_sendfile(),
            DownloadMode::XAccelRedirect => match self.accel_mapping.map(&response.path) {
                Some(uri) => response.with_accel_redirect(uri),
                None => {
                    warn!(
                        "No accel mapping covers {}, streaming media {} instead",
                        response.path.display(),
                        media.id
                    );
                    response
                }
            },
            DownloadMode::Http | DownloadMode::Redirect => response,
        };

        Ok(MediaResponse::File(response))
    }

    async fn reference_file(&self, media: &Media) -> Result<ReferenceFile, ProviderError> {
        let relative = self.relative_path(media, &Format::reference())?;
        let content = tokio::fs::read(self.root.join(relative)).await?;

        Ok(ReferenceFile {
            content: Bytes::from(content),
            extension: media.extension.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::response::SendfileHeader;

    fn media() -> Media {
        Media::new(9u64, "image", "default", "default/0001/9.png")
    }

    #[tokio::test]
    async fn test_reference_file_reads_bytes() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("default/0001")).unwrap();
        std::fs::write(dir.path().join("default/0001/9.png"), b"png-bytes").unwrap();
        let provider = FilesystemProvider::new("image", dir.path());

        let file = provider.reference_file(&media()).await.unwrap();
        assert_eq!(file.content.as_ref(), b"png-bytes");
        assert_eq!(file.extension, "png");
    }

    #[tokio::test]
    async fn test_http_mode_returns_file_response() {
        let provider = FilesystemProvider::new("image", "/srv/media");

        let response = provider
            .download_response(&media(), &Format::reference(), DownloadMode::Http)
            .await
            .unwrap();

        let MediaResponse::File(file) = response else {
            panic!("expected file response");
        };
        assert_eq!(file.path, PathBuf::from("/srv/media/default/0001/9.png"));
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.download_name.as_deref(), Some("9.png"));
        assert_eq!(file.sendfile, None);
    }

    #[tokio::test]
    async fn test_named_format_resolves_thumbnail() {
        let provider = FilesystemProvider::new("image", "/srv/media");

        let response = provider
            .download_response(&media(), &Format::new("default_small"), DownloadMode::XSendfile)
            .await
            .unwrap();

        let MediaResponse::File(file) = response else {
            panic!("expected file response");
        };
        assert_eq!(
            file.path,
            PathBuf::from("/srv/media/default/thumb_9_default_small.jpg")
        );
        assert_eq!(file.content_type, "image/jpeg");
        assert_eq!(file.sendfile, Some(SendfileHeader::XSendfile));
    }

    #[tokio::test]
    async fn test_accel_redirect_uses_mapped_uri() {
        let provider = FilesystemProvider::new("image", "/srv/media")
            .with_accel_mapping(AccelMapping::new([("/srv/media", "/protected")]));

        let response = provider
            .download_response(&media(), &Format::reference(), DownloadMode::XAccelRedirect)
            .await
            .unwrap();

        let MediaResponse::File(file) = response else {
            panic!("expected file response");
        };
        assert_eq!(file.sendfile, Some(SendfileHeader::XAccelRedirect));
        assert_eq!(file.sendfile_location(), "/protected/default/0001/9.png");
    }

    #[tokio::test]
    async fn test_unmapped_accel_redirect_streams_the_file() {
        let provider = FilesystemProvider::new("image", "/srv/media")
            .with_accel_mapping(AccelMapping::new([("/var/other", "/other")]));

        let response = provider
            .download_response(&media(), &Format::reference(), DownloadMode::XAccelRedirect)
            .await
            .unwrap();

        let MediaResponse::File(file) = response else {
            panic!("expected file response");
        };
        assert_eq!(file.sendfile, None);
        assert_eq!(file.internal_uri, None);
    }

    #[tokio::test]
    async fn test_redirect_mode_requires_public_url() {
        let provider = FilesystemProvider::new("image", "/srv/media");
        let result = provider
            .download_response(&media(), &Format::reference(), DownloadMode::Redirect)
            .await;
        assert!(matches!(result, Err(ProviderError::UnsupportedMode { .. })));

        let provider = provider.with_public_base_url("https://cdn.example.com/media/");
        let response = provider
            .download_response(&media(), &Format::reference(), DownloadMode::Redirect)
            .await
            .unwrap();
        assert_eq!(
            response,
            MediaResponse::Redirect(RedirectResponse::temporary(
                "https://cdn.example.com/media/default/0001/9.png"
            ))
        );
    }

    #[tokio::test]
    async fn test_references_escaping_root_are_rejected() {
        let provider = FilesystemProvider::new("file", "/srv/media");
        let evil = Media::new(1u64, "file", "default", "../etc/passwd");

        let result = provider.reference_file(&evil).await;
        assert!(matches!(result, Err(ProviderError::InvalidReference { .. })));

        let absolute = Media::new(2u64, "file", "default", "/etc/passwd");
        assert!(provider.reference_file(&absolute).await.is_err());
    }
}
