//! Shared setup for the router tests
//!
//! Builds a media root with real JPEG references, a JSON catalog and a
//! configuration with one context per download strategy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use image::{Rgb, RgbImage};
use mediagate_core::components::build_gateway;
use mediagate_core::config::{
    CacheBackend, ContextConfig, MediaGateConfig, StrategyConfig, UserConfig,
};
use mediagate_core::gateway::TEMP_FILE_PREFIX;
use mediagate_core::{DownloadMode, Media};
use mediagate_web::{AppState, Authenticator, build_router};
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const EDITOR_TOKEN: &str = "editor-token";
pub const PUBLIC_URL: &str = "http://media.test";
pub const ACCEL_PREFIX: &str = "/protected";

/// Router over a scratch deployment.
pub struct TestDeployment {
    pub router: Router,
    pub config: MediaGateConfig,
    _dir: TempDir,
}

/// Parts of a response the tests look at.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

fn write_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_fn(width, height, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]))
        .save(path)
        .unwrap();
}

fn context(
    formats: &[&str],
    strategy: StrategyConfig,
    download_mode: DownloadMode,
) -> ContextConfig {
    ContextConfig {
        formats: formats.iter().map(|f| f.to_string()).collect(),
        strategy,
        download_mode,
    }
}

impl TestDeployment {
    /// Deployment with a filesystem cache.
    pub async fn new() -> Self {
        Self::with_backend(CacheBackend::Filesystem).await
    }

    /// Deployment with the given cache backend.
    ///
    /// Media: 5 in `default` (ROLE_ADMIN), 6 in `public`, 7 in `session`
    /// (one download per session), 8 in `fronted` (public, X-Accel-Redirect).
    pub async fn with_backend(backend: CacheBackend) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = MediaGateConfig::for_testing(dir.path());
        config.cache.backend = backend;

        let media = vec![
            Media::new(5u64, "image", "default", "default/5.jpg"),
            Media::new(6u64, "image", "public", "public/6.jpg"),
            Media::new(7u64, "image", "session", "session/7.jpg"),
            Media::new(8u64, "image", "fronted", "fronted/8.jpg"),
        ];
        for record in &media {
            write_jpeg(&config.storage.media_root.join(&record.reference), 160, 120);
        }
        write_jpeg(
            &config.storage.media_root.join("public/thumb_6_public_small.jpg"),
            100,
            70,
        );

        let media_root = config.storage.media_root.clone();
        config
            .storage
            .accel_mapping
            .insert(media_root, ACCEL_PREFIX.to_string());

        let catalog = dir.path().join("catalog.json");
        std::fs::write(&catalog, serde_json::to_string(&media).unwrap()).unwrap();
        config.storage.catalog = Some(catalog);

        config.contexts.clear();
        config.contexts.insert(
            "default".to_string(),
            context(
                &["small", "big"],
                StrategyConfig::Roles {
                    roles: vec!["ROLE_ADMIN".to_string()],
                },
                DownloadMode::Http,
            ),
        );
        config.contexts.insert(
            "public".to_string(),
            context(&["small"], StrategyConfig::Public, DownloadMode::Http),
        );
        config.contexts.insert(
            "session".to_string(),
            context(&[], StrategyConfig::Session { times: 1 }, DownloadMode::Http),
        );
        config.contexts.insert(
            "fronted".to_string(),
            context(&[], StrategyConfig::Public, DownloadMode::XAccelRedirect),
        );

        config.security.tokens.insert(
            ADMIN_TOKEN.to_string(),
            UserConfig {
                username: "admin".to_string(),
                roles: vec!["ROLE_ADMIN".to_string()],
            },
        );
        config.security.tokens.insert(
            EDITOR_TOKEN.to_string(),
            UserConfig {
                username: "editor".to_string(),
                roles: vec!["ROLE_EDITOR".to_string()],
            },
        );

        let state = AppState {
            gateway: Arc::new(build_gateway(&config).await.unwrap()),
            authenticator: Arc::new(Authenticator::from_config(&config.security)),
            public_url: PUBLIC_URL.to_string(),
        };
        let router = build_router(state, &config.cache);

        Self {
            router,
            config,
            _dir: dir,
        }
    }

    /// Sends a GET request with extra headers.
    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut request = Request::builder().uri(uri);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Location of a file under the media root.
    pub fn media_file(&self, relative: &str) -> PathBuf {
        self.config.storage.media_root.join(relative)
    }

    /// Filter temp files left in the temp directory.
    pub fn leftover_temp_files(&self) -> usize {
        match std::fs::read_dir(&self.config.storage.temp_dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| {
                    entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| name.starts_with(TEMP_FILE_PREFIX))
                })
                .count(),
            Err(_) => 0,
        }
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
