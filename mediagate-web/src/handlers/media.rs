//! Download, view and filtered-image endpoints

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use mediagate_core::{Format, GatewayError, MediaId, MediaView};
use serde::Deserialize;
use tracing::debug;

use super::response::{ApiError, into_http_response};
use crate::server::AppState;

/// Query string of the download and view endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct FormatQuery {
    /// Requested format, the reference file when absent
    pub format: Option<String>,
}

impl FormatQuery {
    fn format(&self) -> Format {
        self.format
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(Format::new)
            .unwrap_or_default()
    }
}

/// `GET /media/download/{id}`
///
/// # Errors
/// - `ApiError::Gateway` - If the media is missing, denied or cannot be delivered
pub async fn download_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<FormatQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let request = state.media_request(&headers);
    let response = state
        .gateway
        .download(&request, &MediaId::new(id), &query.format())
        .await?;
    into_http_response(response).await
}

/// `GET /media/view/{id}`
///
/// # Errors
/// - `ApiError::Gateway` - If the media is missing or denied
pub async fn view_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<FormatQuery>,
    headers: HeaderMap,
) -> Result<Json<MediaView>, ApiError> {
    let request = state.media_request(&headers);
    let view = state
        .gateway
        .view(&request, &MediaId::new(id), &query.format())
        .await?;
    Ok(Json(view))
}

/// `GET /media/filter/{path}/{filter}`
///
/// The last segment names the filter, everything before it is the image path.
///
/// # Errors
/// - `ApiError::Gateway` - If the path or filter is unknown, or generation failed
pub async fn filtered_image(
    State(state): State<AppState>,
    Path(rest): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (path, filter) = rest.rsplit_once('/').ok_or_else(|| GatewayError::NotFound {
        reason: format!("no filter in {rest}"),
    })?;
    debug!("Filtered image request for {} through {}", path, filter);

    let request = state.media_request(&headers);
    let response = state
        .gateway
        .serve_filtered_image(&request, path, filter)
        .await?;
    into_http_response(response).await
}
