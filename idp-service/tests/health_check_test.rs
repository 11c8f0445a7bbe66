mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};

#[tokio::test]
async fn test_health_check_reports_service_and_database() {
    // 1. Setup
    let app = TestApp::spawn().await;

    // 2. Health check
    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "idp-service");
    assert_eq!(body["checks"]["database"], "up");
}

#[tokio::test]
async fn test_responses_echo_the_request_id() {
    // 1. Setup
    let app = TestApp::spawn().await;

    // 2. An inbound x-request-id comes back unchanged
    let response = app
        .request(
            axum::http::Request::builder()
                .method("GET")
                .uri("/health")
                .header("x-request-id", "corr-12345")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "corr-12345"
    );

    // 3. Without one, the service mints its own
    let response = app.get("/health", None).await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_health_check_is_not_tenant_scoped() {
    // 1. Setup: multi-tenant mode, where every other route needs a
    //    resolvable subdomain
    let app = TestApp::spawn_multi().await;

    // 2. A bare apex host cannot resolve a tenant, but /health still answers
    let response = app
        .request(
            axum::http::Request::builder()
                .method("GET")
                .uri("/health")
                .header("host", "idp.test")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}
