//! Plain internal dialect: info/tile/resize verb routing and error mapping.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use super::test_utils::test_router;

#[tokio::test]
async fn internal_dialect_unrecognized_path_is_bad_request() {
    let app = test_router();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/images/someimage/not-a-known-verb")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn internal_dialect_info_for_missing_image_is_not_found() {
    let app = test_router();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/images/does-not-exist/info")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
