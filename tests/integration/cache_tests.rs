//! `/debug/stats` cache counter exposure.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use super::test_utils::test_router;

#[tokio::test]
async fn stats_endpoint_reports_json_counters() {
    let app = test_router();
    let response = app
        .oneshot(Request::builder().uri("/debug/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body.get("info_cache").is_some());
    assert!(body.get("tile_cache").is_some());
}
