//! Integration tests for `GET /media/view/{id}`

use axum::http::StatusCode;

use crate::support::{ADMIN_TOKEN, TestDeployment, bearer};

#[tokio::test]
async fn test_view_lists_context_formats() {
    let deployment = TestDeployment::new().await;
    let admin = bearer(ADMIN_TOKEN);

    let response = deployment
        .get("/media/view/5?format=default_big", &[("authorization", admin.as_str())])
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let view = response.json();
    assert_eq!(view["media"]["id"], "5");
    assert_eq!(view["media"]["context"], "default");
    assert_eq!(view["media"]["content_type"], "image/jpeg");
    assert_eq!(view["formats"], serde_json::json!(["default_small", "default_big"]));
    assert_eq!(view["format"], "default_big");
}

#[tokio::test]
async fn test_view_defaults_to_reference_format() {
    let deployment = TestDeployment::new().await;

    let response = deployment.get("/media/view/6", &[]).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["format"], "reference");
    assert_eq!(response.json()["formats"], serde_json::json!(["public_small"]));
}

#[tokio::test]
async fn test_view_is_idempotent() {
    let deployment = TestDeployment::new().await;

    let first = deployment.get("/media/view/6", &[]).await;
    let second = deployment.get("/media/view/6", &[]).await;

    assert_eq!(first.json(), second.json());
}

#[tokio::test]
async fn test_view_denied_and_missing() {
    let deployment = TestDeployment::new().await;

    assert_eq!(
        deployment.get("/media/view/5", &[]).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        deployment.get("/media/view/404", &[]).await.status,
        StatusCode::NOT_FOUND
    );
}
