//! Responses produced by providers, caches and filters.
//!
//! Kept independent of any HTTP framework. The web layer turns a
//! `MediaResponse` into wire bytes once the gateway has returned it.

pub mod range;

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
pub use range::{ByteRange, RangeNotSatisfiable, parse_range_header};
use tracing::debug;

use crate::request::MediaRequest;

/// Format a timestamp as an HTTP date (RFC 7231 IMF-fixdate).
pub fn http_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date header value.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Response to a media request.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaResponse {
    /// Bytes backed by a file on disk
    File(FileResponse),
    /// Bytes held in memory
    Content(ContentResponse),
    /// Client should fetch the bytes elsewhere
    Redirect(RedirectResponse),
}

impl MediaResponse {
    /// HTTP status this response will be sent with.
    pub fn status(&self) -> u16 {
        match self {
            MediaResponse::File(file) => file.status(),
            MediaResponse::Content(content) => content.status,
            MediaResponse::Redirect(redirect) => {
                if redirect.permanent {
                    301
                } else {
                    302
                }
            }
        }
    }
}

/// Header used to hand file delivery to the front web server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendfileHeader {
    /// Apache / lighttpd `X-Sendfile`
    XSendfile,
    /// nginx `X-Accel-Redirect`
    XAccelRedirect,
}

impl SendfileHeader {
    /// Header name as sent on the wire.
    pub fn header_name(self) -> &'static str {
        match self {
            SendfileHeader::XSendfile => "X-Sendfile",
            SendfileHeader::XAccelRedirect => "X-Accel-Redirect",
        }
    }
}

/// Maps filesystem prefixes to the internal URIs nginx serves them under.
///
/// `X-Accel-Redirect` takes a URI, not a path. A file outside every mapped
/// prefix cannot be delegated and is streamed instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccelMapping {
    prefixes: Vec<(PathBuf, String)>,
}

impl AccelMapping {
    /// Creates a mapping from `(path prefix, URI prefix)` pairs.
    ///
    /// Longer path prefixes take precedence.
    pub fn new<I, P, U>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = (P, U)>,
        P: Into<PathBuf>,
        U: Into<String>,
    {
        let mut prefixes: Vec<(PathBuf, String)> = prefixes
            .into_iter()
            .map(|(path, uri)| (path.into(), uri.into().trim_end_matches('/').to_string()))
            .collect();
        prefixes.sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
        Self { prefixes }
    }

    /// Whether no prefix is mapped.
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Internal URI of `path`, if it lies under a mapped prefix.
    pub fn map(&self, path: &Path) -> Option<String> {
        self.prefixes.iter().find_map(|(prefix, uri)| {
            let relative = path.strip_prefix(prefix).ok()?;
            let mut segments = Vec::new();
            for component in relative.components() {
                match component {
                    Component::Normal(segment) => segments.push(segment.to_str()?),
                    Component::CurDir => {}
                    _ => return None,
                }
            }
            Some(format!("{}/{}", uri, segments.join("/")))
        })
    }
}

/// What the web layer has to send for a prepared file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDelivery {
    /// Entire file, 200
    Full,
    /// Single byte range, 206
    Partial(ByteRange),
    /// Client copy is current, 304 without body
    NotModified,
    /// Requested range lies outside the file, 416
    RangeNotSatisfiable,
    /// Front server sends the bytes, 200 without body
    Delegated(SendfileHeader),
}

/// File facts gathered when a response is prepared against a request.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedFile {
    /// Size of the file on disk
    pub file_size: u64,
    /// Modification time, when the filesystem reports one
    pub last_modified: Option<DateTime<Utc>>,
    /// Weak validator derived from size and modification time
    pub etag: String,
    /// Delivery decided from the request's range and conditional headers
    pub delivery: FileDelivery,
}

/// Response streaming a file from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct FileResponse {
    /// Absolute location of the file
    pub path: PathBuf,
    /// MIME type sent as `Content-Type`
    pub content_type: String,
    /// File name offered through `Content-Disposition: attachment`
    pub download_name: Option<String>,
    /// Set when the front server delivers the bytes
    pub sendfile: Option<SendfileHeader>,
    /// Internal URI sent with `X-Accel-Redirect`
    pub internal_uri: Option<String>,
    /// Filled by [`FileResponse::prepare`]
    pub prepared: Option<PreparedFile>,
}

impl FileResponse {
    /// Creates an unprepared response for a file.
    pub fn new(path: impl Into<PathBuf>, content_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content_type: content_type.into(),
            download_name: None,
            sendfile: None,
            internal_uri: None,
            prepared: None,
        }
    }

    /// Offers the file as an attachment with the given name.
    pub fn with_download_name(mut self, name: impl Into<String>) -> Self {
        self.download_name = Some(name.into());
        self
    }

    /// Delegates delivery to the front server through `X-Sendfile`.
    pub fn with_x_sendfile(mut self) -> Self {
        self.sendfile = Some(SendfileHeader::XSendfile);
        self.internal_uri = None;
        self
    }

    /// Delegates delivery to nginx, which serves the file at `uri`.
    pub fn with_accel_redirect(mut self, uri: impl Into<String>) -> Self {
        self.sendfile = Some(SendfileHeader::XAccelRedirect);
        self.internal_uri = Some(uri.into());
        self
    }

    /// Value of the sendfile header: the internal URI for nginx, the
    /// absolute path otherwise.
    pub fn sendfile_location(&self) -> String {
        match &self.internal_uri {
            Some(uri) => uri.clone(),
            None => self.path.display().to_string(),
        }
    }

    /// HTTP status once prepared; 200 before preparation.
    pub fn status(&self) -> u16 {
        match self.prepared.as_ref().map(|p| p.delivery) {
            Some(FileDelivery::Partial(_)) => 206,
            Some(FileDelivery::NotModified) => 304,
            Some(FileDelivery::RangeNotSatisfiable) => 416,
            _ => 200,
        }
    }

    /// Finalize the response against the inbound request.
    ///
    /// Reads the file metadata and decides between a full body, a single
    /// range, a 304, a 416, or delegation to the front server. Never changes
    /// which file is served.
    ///
    /// # Errors
    /// - `std::io::Error` - If the file metadata cannot be read
    pub async fn prepare(&mut self, request: &MediaRequest) -> Result<(), std::io::Error> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        let file_size = metadata.len();
        let last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);
        let etag = format!(
            "W/\"{:x}-{:x}\"",
            file_size,
            last_modified.map(|t| t.timestamp()).unwrap_or_default()
        );

        let delivery = if let Some(header) = self.sendfile {
            FileDelivery::Delegated(header)
        } else if is_not_modified(request, &etag, last_modified.as_ref()) {
            FileDelivery::NotModified
        } else {
            match request.range.as_deref() {
                Some(range) if if_range_matches(request, last_modified.as_ref()) => {
                    match parse_range_header(range, file_size) {
                        Ok(Some(byte_range)) => FileDelivery::Partial(byte_range),
                        Ok(None) => FileDelivery::Full,
                        Err(_) => FileDelivery::RangeNotSatisfiable,
                    }
                }
                _ => FileDelivery::Full,
            }
        };

        debug!(
            "Prepared {} ({} bytes): {:?}",
            self.path.display(),
            file_size,
            delivery
        );

        self.prepared = Some(PreparedFile {
            file_size,
            last_modified,
            etag,
            delivery,
        });
        Ok(())
    }
}

/// `If-None-Match` wins over `If-Modified-Since` when both are present.
fn is_not_modified(
    request: &MediaRequest,
    etag: &str,
    last_modified: Option<&DateTime<Utc>>,
) -> bool {
    if let Some(if_none_match) = request.if_none_match.as_deref() {
        return if_none_match
            .split(',')
            .map(str::trim)
            .any(|candidate| candidate == "*" || candidate == etag);
    }

    match (request.if_modified_since, last_modified) {
        (Some(since), Some(modified)) => modified.timestamp() <= since.timestamp(),
        _ => false,
    }
}

/// A range is honored only while the date in `If-Range` still matches.
///
/// The ETag is weak and `If-Range` needs a strong comparison, so an entity
/// tag never satisfies it.
fn if_range_matches(request: &MediaRequest, last_modified: Option<&DateTime<Utc>>) -> bool {
    let Some(if_range) = request.if_range.as_deref().map(str::trim) else {
        return true;
    };
    match (parse_http_date(if_range), last_modified) {
        (Some(date), Some(modified)) => date.timestamp() == modified.timestamp(),
        _ => false,
    }
}

/// Response carrying its body in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentResponse {
    /// HTTP status code
    pub status: u16,
    /// MIME type sent as `Content-Type`
    pub content_type: String,
    /// Extra headers
    pub headers: Vec<(String, String)>,
    /// Body bytes
    pub body: Bytes,
}

impl ContentResponse {
    /// Creates a 200 response.
    pub fn ok(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            content_type: content_type.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a response header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Response pointing the client at another location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResponse {
    /// Target URL
    pub location: String,
    /// 301 when true, 302 otherwise
    pub permanent: bool,
}

impl RedirectResponse {
    /// Creates a 302 redirect.
    pub fn temporary(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            permanent: false,
        }
    }

    /// Creates a 301 redirect.
    pub fn permanent(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            permanent: true,
        }
    }
}
