//! Deep Zoom dialect: descriptor and tile-path error mapping.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use super::test_utils::test_router;

#[tokio::test]
async fn dzi_descriptor_for_missing_image_is_not_found() {
    let app = test_router();
    let response = app
        .oneshot(Request::builder().uri("/images/dzi/does-not-exist.dzi").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_dzi_tile_path_is_bad_request() {
    let app = test_router();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/images/dzi/someimage_files/not-a-level/0_0.jpg")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
