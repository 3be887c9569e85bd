//! Integration tests for `GET /media/download/{id}`

use axum::http::StatusCode;

use crate::support::{ACCEL_PREFIX, ADMIN_TOKEN, EDITOR_TOKEN, TestDeployment, bearer};

#[tokio::test]
async fn test_anonymous_download_of_protected_media_is_forbidden() {
    let deployment = TestDeployment::new().await;

    let response = deployment.get("/media/download/5", &[]).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json()["error"], "forbidden");
}

#[tokio::test]
async fn test_download_requires_every_role() {
    let deployment = TestDeployment::new().await;

    let editor = deployment
        .get("/media/download/5", &[("authorization", bearer(EDITOR_TOKEN).as_str())])
        .await;
    let unknown = deployment
        .get("/media/download/5", &[("authorization", "Bearer nobody")])
        .await;

    assert_eq!(editor.status, StatusCode::FORBIDDEN);
    assert_eq!(unknown.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_downloads_reference_file() {
    let deployment = TestDeployment::new().await;

    let response = deployment
        .get("/media/download/5", &[("authorization", bearer(ADMIN_TOKEN).as_str())])
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("image/jpeg"));
    assert_eq!(
        response.header("content-disposition"),
        Some("attachment; filename=\"5.jpg\"")
    );
    assert_eq!(
        response.body.to_vec(),
        std::fs::read(deployment.media_file("default/5.jpg")).unwrap()
    );
}

#[tokio::test]
async fn test_unknown_media_is_not_found() {
    let deployment = TestDeployment::new().await;

    let response = deployment
        .get("/media/download/999", &[("authorization", bearer(ADMIN_TOKEN).as_str())])
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["error"], "not_found");
}

#[tokio::test]
async fn test_range_and_conditional_requests() {
    let deployment = TestDeployment::new().await;
    let reference = std::fs::read(deployment.media_file("public/6.jpg")).unwrap();

    let full = deployment.get("/media/download/6", &[]).await;
    let etag = full.header("etag").unwrap().to_string();

    let partial = deployment
        .get("/media/download/6", &[("range", "bytes=0-99")])
        .await;
    assert_eq!(partial.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        partial.header("content-range"),
        Some(format!("bytes 0-99/{}", reference.len()).as_str())
    );
    assert_eq!(partial.body.as_ref(), &reference[..100]);

    let unsatisfiable = deployment
        .get("/media/download/6", &[("range", "bytes=99999999-")])
        .await;
    assert_eq!(unsatisfiable.status, StatusCode::RANGE_NOT_SATISFIABLE);

    let not_modified = deployment
        .get("/media/download/6", &[("if-none-match", etag.as_str())])
        .await;
    assert_eq!(not_modified.status, StatusCode::NOT_MODIFIED);
    assert!(not_modified.body.is_empty());
}

#[tokio::test]
async fn test_download_named_format() {
    let deployment = TestDeployment::new().await;

    let response = deployment
        .get("/media/download/6?format=public_small", &[])
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("content-disposition"),
        Some("attachment; filename=\"6_public_small.jpg\"")
    );
    assert_eq!(
        response.body.to_vec(),
        std::fs::read(deployment.media_file("public/thumb_6_public_small.jpg")).unwrap()
    );
}

#[tokio::test]
async fn test_missing_format_file_is_a_server_error() {
    let deployment = TestDeployment::new().await;

    let response = deployment
        .get("/media/download/6?format=public_big", &[])
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "internal_error");
}

#[tokio::test]
async fn test_session_strategy_counts_per_session() {
    let deployment = TestDeployment::new().await;
    let cookie = ("cookie", "mediagate_session=s1");

    let first = deployment.get("/media/download/7", &[cookie]).await;
    let second = deployment.get("/media/download/7", &[cookie]).await;
    let other_session = deployment
        .get("/media/download/7", &[("cookie", "mediagate_session=s2")])
        .await;
    let no_session = deployment.get("/media/download/7", &[]).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::FORBIDDEN);
    assert_eq!(other_session.status, StatusCode::OK);
    assert_eq!(no_session.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_accel_redirect_delegates_to_front_server() {
    let deployment = TestDeployment::new().await;

    let response = deployment.get("/media/download/8", &[]).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("x-accel-redirect"),
        Some(format!("{ACCEL_PREFIX}/fronted/8.jpg").as_str())
    );
    assert!(response.body.is_empty());
}
