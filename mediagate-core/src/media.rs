//! Media records and the vocabulary used to address them.
//!
//! A `Media` is owned by the storage layer. The gateway only borrows it for
//! the duration of a request and never mutates it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque media identifier.
///
/// Catalogs may spell identifiers as strings or integers. Both forms are
/// normalized to their string representation so lookups by a numeric id
/// captured from a filter path hit the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    /// Creates an identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for MediaId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for MediaId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl FromStr for MediaId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for MediaId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => MediaId::from(n),
            RawId::Text(s) => MediaId(s),
        })
    }
}

/// Named rendition of a media.
///
/// `Format::REFERENCE` addresses the original, unmodified file. Every other
/// name is context-qualified, e.g. `default_small`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Format(String);

impl Format {
    /// Name of the sentinel format for the original file.
    pub const REFERENCE: &'static str = "reference";

    /// Creates a format from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The original, unmodified file.
    pub fn reference() -> Self {
        Self(Self::REFERENCE.to_string())
    }

    /// Whether this format addresses the original file.
    pub fn is_reference(&self) -> bool {
        self.0 == Self::REFERENCE
    }

    /// Returns the format name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Format {
    fn default() -> Self {
        Self::reference()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the bytes of a download reach the client.
///
/// Configured per context, never per media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadMode {
    /// Bytes are streamed through the application.
    #[default]
    Http,
    /// Delivery is delegated to the front server through `X-Sendfile`.
    XSendfile,
    /// Delivery is delegated to nginx through `X-Accel-Redirect`.
    XAccelRedirect,
    /// Client is redirected to the storage's public URL.
    Redirect,
}

impl fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadMode::Http => write!(f, "http"),
            DownloadMode::XSendfile => write!(f, "x-sendfile"),
            DownloadMode::XAccelRedirect => write!(f, "x-accel-redirect"),
            DownloadMode::Redirect => write!(f, "redirect"),
        }
    }
}

/// A managed asset record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    /// Identifier used by the repository
    pub id: MediaId,
    /// Display name, also used as the download file name
    pub name: String,
    /// Name of the provider that owns the stored bytes
    pub provider_name: String,
    /// Context grouping formats and download policy
    pub context: String,
    /// File extension of the reference file, without the leading dot
    pub extension: String,
    /// MIME type of the reference file
    pub content_type: String,
    /// Location of the reference file relative to the provider root
    pub reference: String,
}

impl Media {
    /// Creates a media record with a content type guessed from the extension.
    pub fn new(
        id: impl Into<MediaId>,
        provider_name: impl Into<String>,
        context: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        let reference = reference.into();
        let extension = std::path::Path::new(&reference)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_string();
        let content_type = mime_guess::from_ext(&extension)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let name = std::path::Path::new(&reference)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();

        Self {
            id: id.into(),
            name,
            provider_name: provider_name.into(),
            context: context.into(),
            extension,
            content_type,
            reference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_id_accepts_numbers_and_strings() {
        let ids: Vec<MediaId> = serde_json::from_str(r#"[5, "5", "abc"]"#).unwrap();
        assert_eq!(ids[0], ids[1]);
        assert_eq!(ids[2].as_str(), "abc");
    }

    #[test]
    fn test_format_defaults_to_reference() {
        let format = Format::default();
        assert!(format.is_reference());
        assert_eq!(format.to_string(), "reference");
        assert!(!Format::new("default_small").is_reference());
    }

    #[test]
    fn test_download_mode_serde_names() {
        let mode: DownloadMode = serde_json::from_str(r#""x-accel-redirect""#).unwrap();
        assert_eq!(mode, DownloadMode::XAccelRedirect);
        assert_eq!(DownloadMode::default(), DownloadMode::Http);
    }

    #[test]
    fn test_media_new_derives_metadata_from_reference() {
        let media = Media::new(7u64, "image", "default", "default/0001/cat.jpg");
        assert_eq!(media.id.as_str(), "7");
        assert_eq!(media.extension, "jpg");
        assert_eq!(media.content_type, "image/jpeg");
        assert_eq!(media.name, "cat.jpg");
    }
}
