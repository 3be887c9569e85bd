//! Conversion of gateway results into HTTP responses.

use std::io::SeekFrom;

use axum::Json;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use mediagate_core::response::{
    ContentResponse, FileDelivery, FileResponse, RedirectResponse, http_date,
};
use mediagate_core::{ErrorKind, GatewayError, MediaRequest, MediaResponse};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{error, warn};

/// Errors returned by the media handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Gateway operation failed
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Response body could not be produced
    #[error("Response failed: {0}")]
    Io(#[from] std::io::Error),

    /// Response head could not be built
    #[error("Invalid response: {0}")]
    Http(#[from] axum::http::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    /// Status code the error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Gateway(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::CollaboratorFailure => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Io(_) | ApiError::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, message) = match status {
            StatusCode::NOT_FOUND => ("not_found", self.to_string()),
            StatusCode::FORBIDDEN => ("forbidden", self.to_string()),
            _ => {
                error!("Media request failed: {}", self);
                ("internal_error", "Media could not be delivered".to_string())
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

/// Turn a gateway response into an HTTP response.
///
/// # Errors
/// - `ApiError::Io` - If a file-backed body cannot be opened
/// - `ApiError::Http` - If a header value is invalid
pub async fn into_http_response(response: MediaResponse) -> Result<Response, ApiError> {
    match response {
        MediaResponse::File(file) => file_response(file).await,
        MediaResponse::Content(content) => content_response(content),
        MediaResponse::Redirect(redirect) => redirect_response(redirect),
    }
}

async fn file_response(mut file: FileResponse) -> Result<Response, ApiError> {
    if file.prepared.is_none() {
        file.prepare(&MediaRequest::new()).await?;
    }
    let Some(prepared) = file.prepared.clone() else {
        return Err(std::io::Error::other("file response was not prepared").into());
    };

    let mut builder = Response::builder()
        .status(file.status())
        .header(header::ETAG, prepared.etag.as_str())
        .header(header::ACCEPT_RANGES, "bytes");
    if let Some(modified) = prepared.last_modified {
        builder = builder.header(header::LAST_MODIFIED, http_date(&modified));
    }
    if prepared.delivery == FileDelivery::NotModified {
        return Ok(builder.body(Body::empty())?);
    }

    builder = builder.header(header::CONTENT_TYPE, file.content_type.as_str());
    if let Some(name) = &file.download_name {
        builder = builder.header(header::CONTENT_DISPOSITION, content_disposition(name));
    }

    let response = match prepared.delivery {
        FileDelivery::Delegated(sendfile) => builder
            .header(sendfile.header_name(), file.sendfile_location())
            .body(Body::empty())?,
        FileDelivery::RangeNotSatisfiable => builder
            .header(header::CONTENT_RANGE, format!("bytes */{}", prepared.file_size))
            .body(Body::empty())?,
        FileDelivery::Partial(range) => {
            let mut handle = tokio::fs::File::open(&file.path).await?;
            handle.seek(SeekFrom::Start(range.start)).await?;
            builder
                .header(header::CONTENT_RANGE, range.content_range(prepared.file_size))
                .header(header::CONTENT_LENGTH, range.len())
                .body(Body::from_stream(ReaderStream::new(handle.take(range.len()))))?
        }
        FileDelivery::Full | FileDelivery::NotModified => {
            let handle = tokio::fs::File::open(&file.path).await?;
            builder
                .header(header::CONTENT_LENGTH, prepared.file_size)
                .body(Body::from_stream(ReaderStream::new(handle)))?
        }
    };
    Ok(response)
}

fn content_response(content: ContentResponse) -> Result<Response, ApiError> {
    let status = StatusCode::from_u16(content.status).unwrap_or_else(|_| {
        warn!("Invalid status {} in content response", content.status);
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content.content_type.as_str())
        .header(header::CONTENT_LENGTH, content.body.len());
    for (name, value) in &content.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    Ok(builder.body(Body::from(content.body))?)
}

fn redirect_response(redirect: RedirectResponse) -> Result<Response, ApiError> {
    let status = if redirect.permanent {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::FOUND
    };
    Ok(Response::builder()
        .status(status)
        .header(header::LOCATION, redirect.location)
        .body(Body::empty())?)
}

/// `Content-Disposition` value offering a file as an attachment.
fn content_disposition(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{sanitized}\"")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use axum::body::to_bytes;
    use tempfile::NamedTempFile;

    use super::*;

    fn file_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn test_full_file_with_attachment() {
        let file = file_with(b"0123456789");
        let mut media_file =
            FileResponse::new(file.path(), "image/jpeg").with_download_name("photo \"1\".jpg");
        media_file.prepare(&MediaRequest::new()).await.unwrap();

        let response = into_http_response(MediaResponse::File(media_file)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"photo _1_.jpg\""
        );
        assert!(response.headers().contains_key(header::ETAG));
        assert_eq!(body_bytes(response).await, b"0123456789");
    }

    #[tokio::test]
    async fn test_partial_file() {
        let file = file_with(b"0123456789");
        let mut media_file = FileResponse::new(file.path(), "text/plain");
        media_file
            .prepare(&MediaRequest::new().with_range("bytes=2-5"))
            .await
            .unwrap();

        let response = into_http_response(MediaResponse::File(media_file)).await.unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 2-5/10");
        assert_eq!(body_bytes(response).await, b"2345");
    }

    #[tokio::test]
    async fn test_unsatisfiable_range() {
        let file = file_with(b"0123456789");
        let mut media_file = FileResponse::new(file.path(), "text/plain");
        media_file
            .prepare(&MediaRequest::new().with_range("bytes=50-"))
            .await
            .unwrap();

        let response = into_http_response(MediaResponse::File(media_file)).await.unwrap();

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */10");
    }

    #[tokio::test]
    async fn test_sendfile_delegation_has_no_body() {
        let file = file_with(b"0123456789");
        let mut media_file = FileResponse::new(file.path(), "text/plain").with_x_sendfile();
        media_file.prepare(&MediaRequest::new()).await.unwrap();

        let response = into_http_response(MediaResponse::File(media_file)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["x-sendfile"],
            file.path().display().to_string().as_str()
        );
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_content_and_redirect() {
        let content =
            ContentResponse::ok("image/png", vec![1u8, 2]).with_header("X-Filter", "small");
        let response = into_http_response(MediaResponse::Content(content)).await.unwrap();
        assert_eq!(response.headers()["x-filter"], "small");
        assert_eq!(body_bytes(response).await, vec![1u8, 2]);

        let redirect = RedirectResponse::permanent("http://cdn.example.com/a.jpg");
        let response = into_http_response(MediaResponse::Redirect(redirect)).await.unwrap();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "http://cdn.example.com/a.jpg");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let not_found = ApiError::from(GatewayError::NotFound {
            reason: "media 9".to_string(),
        });
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let failure = ApiError::from(std::io::Error::other("disk gone"));
        let response = failure.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"], "internal_error");
    }
}
