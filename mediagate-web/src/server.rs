//! HTTP server for mediagate
//!
//! Routes the three media endpoints to the gateway and publishes the
//! filesystem cache directory for cache-hit redirects.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::HeaderMap;
use axum::routing::get;
use mediagate_core::components::build_gateway;
use mediagate_core::config::{CacheBackend, CacheConfig};
use mediagate_core::{MediaGateConfig, MediaGateError, MediaGateway, MediaRequest};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::Authenticator;
use crate::handlers::{download_media, filtered_image, view_media};

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Components could not be built
    #[error("Startup failed: {0}")]
    Startup(#[from] MediaGateError),

    /// Listener failed
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    /// Gateway answering media requests
    pub gateway: Arc<MediaGateway>,
    /// Bearer token table
    pub authenticator: Arc<Authenticator>,
    /// Base URL used when a request has no `Host` header
    pub public_url: String,
}

impl AppState {
    /// Builds the core request view of an HTTP request.
    pub fn media_request(&self, headers: &HeaderMap) -> MediaRequest {
        self.authenticator.media_request(headers, &self.public_url)
    }
}

/// Router with the media endpoints, and the cache directory when the
/// filesystem backend is configured.
pub fn build_router(state: AppState, cache: &CacheConfig) -> Router {
    let mut app = Router::new()
        .route("/media/download/{id}", get(download_media))
        .route("/media/view/{id}", get(view_media))
        .route("/media/filter/{*rest}", get(filtered_image));

    if cache.backend == CacheBackend::Filesystem {
        let prefix = cache.url_prefix.trim_matches('/');
        if prefix.is_empty() {
            warn!("Cache URL prefix is empty, cached renditions are not published");
        } else {
            app = app.nest_service(&format!("/{prefix}"), ServeDir::new(&cache.root));
        }
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Builds every component from configuration and serves until shutdown.
///
/// # Errors
/// - `ServerError::Startup` - If the gateway cannot be built
/// - `ServerError::Io` - If the listener cannot be bound
pub async fn run_server(config: MediaGateConfig) -> Result<(), ServerError> {
    let address = SocketAddr::new(config.server.host, config.server.port);
    let public_url = config
        .server
        .public_url
        .clone()
        .unwrap_or_else(|| format!("http://{address}"));

    let state = AppState {
        gateway: Arc::new(build_gateway(&config).await?),
        authenticator: Arc::new(Authenticator::from_config(&config.security)),
        public_url: public_url.clone(),
    };
    let app = build_router(state, &config.cache);

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Mediagate listening on {} ({})", address, public_url);
    axum::serve(listener, app).await?;
    Ok(())
}
