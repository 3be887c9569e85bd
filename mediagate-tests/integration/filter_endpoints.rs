//! Integration tests for `GET /media/filter/{path}/{filter}`

use axum::http::StatusCode;
use image::GenericImageView;
use mediagate_core::config::CacheBackend;

use crate::support::{PUBLIC_URL, TestDeployment};

const SMALL: &str = "/media/filter/default/renditions/5_small.jpg/small";

#[tokio::test]
async fn test_miss_generates_then_hit_redirects_to_cache() {
    let deployment = TestDeployment::new().await;

    let generated = deployment.get(SMALL, &[]).await;
    assert_eq!(generated.status, StatusCode::OK);
    assert_eq!(generated.header("content-type"), Some("image/jpeg"));
    let rendition = image::load_from_memory(&generated.body).unwrap();
    assert_eq!(rendition.dimensions(), (100, 70));

    let stored = deployment
        .config
        .cache
        .root
        .join("small/default/renditions/5_small.jpg");
    assert_eq!(std::fs::read(&stored).unwrap(), generated.body.to_vec());
    assert_eq!(deployment.leftover_temp_files(), 0);

    let cached = deployment.get(SMALL, &[]).await;
    assert_eq!(cached.status, StatusCode::MOVED_PERMANENTLY);
    let location = cached.header("location").unwrap().to_string();
    assert_eq!(
        location,
        format!("{PUBLIC_URL}/media/cache/small/default/renditions/5_small.jpg")
    );

    let served = deployment
        .get(location.trim_start_matches(PUBLIC_URL), &[])
        .await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.body, generated.body);
}

#[tokio::test]
async fn test_hit_redirect_uses_request_host() {
    let deployment = TestDeployment::new().await;
    deployment.get(SMALL, &[]).await;

    let cached = deployment
        .get(SMALL, &[("host", "cdn.example.com"), ("x-forwarded-proto", "https")])
        .await;

    assert_eq!(
        cached.header("location"),
        Some("https://cdn.example.com/media/cache/small/default/renditions/5_small.jpg")
    );
}

#[tokio::test]
async fn test_memory_cache_serves_body_on_hit() {
    let deployment = TestDeployment::with_backend(CacheBackend::Memory).await;

    let generated = deployment.get(SMALL, &[]).await;
    let cached = deployment.get(SMALL, &[]).await;

    assert_eq!(generated.status, StatusCode::OK);
    assert_eq!(cached.status, StatusCode::OK);
    assert_eq!(cached.body, generated.body);
}

#[tokio::test]
async fn test_inset_filter_keeps_aspect_ratio() {
    let deployment = TestDeployment::new().await;

    let response = deployment
        .get("/media/filter/default/renditions/5_big.jpg/big", &[])
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let rendition = image::load_from_memory(&response.body).unwrap();
    assert_eq!(rendition.dimensions(), (160, 120));
}

#[tokio::test]
async fn test_filtered_images_ignore_download_strategy() {
    let deployment = TestDeployment::new().await;

    // Media 5 is admin-only for downloads
    let response = deployment.get(SMALL, &[]).await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_rejected_paths_leave_no_trace() {
    let deployment = TestDeployment::new().await;

    for uri in [
        "/media/filter/abc/123_thumb.png/small",
        "/media/filter/abc/def/xyz_thumb.jpg/small",
        "/media/filter/default/renditions/999_small.jpg/small",
        "/media/filter/default/renditions/5_small.jpg/huge",
        "/media/filter/default/../5_small.jpg/small",
        "/media/filter/small",
    ] {
        let response = deployment.get(uri, &[]).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{uri}");
    }

    assert!(!deployment.config.cache.root.exists());
    assert_eq!(deployment.leftover_temp_files(), 0);
}
