mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp, TEST_PASSWORD};

#[tokio::test]
async fn test_single_mode_serves_the_configured_tenant_for_any_host() {
    // 1. Setup
    let app = TestApp::spawn().await;
    app.create_user("alice@example.com").await;

    // 2. The Host header plays no part in single-tenant resolution
    for host in ["localhost:8080", "whatever.invalid", "10.0.0.1"] {
        let response = app
            .post_json_with_host(
                "/users/sign_in",
                &serde_json::json!({ "email": "alice@example.com", "password": TEST_PASSWORD }),
                None,
                host,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "host {} failed", host);
    }
}

#[tokio::test]
async fn test_multi_mode_resolves_the_tenant_from_the_subdomain() {
    // 1. Setup: two tenants with one user each
    let app = TestApp::spawn_multi().await;
    let acme = app.create_tenant("acme").await;
    app.create_user("alice@example.com").await;
    app.create_user_in(&acme, "bob@acme.test").await;

    // 2. Each user signs in under their tenant's subdomain
    let response = app
        .post_json_with_host(
            "/users/sign_in",
            &serde_json::json!({ "email": "alice@example.com", "password": TEST_PASSWORD }),
            None,
            "example.idp.test",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post_json_with_host(
            "/users/sign_in",
            &serde_json::json!({ "email": "bob@acme.test", "password": TEST_PASSWORD }),
            None,
            "acme.idp.test",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_multi_mode_requires_a_subdomain() {
    let app = TestApp::spawn_multi().await;

    let response = app
        .post_json_with_host(
            "/users/sign_in",
            &serde_json::json!({ "email": "alice@example.com", "password": TEST_PASSWORD }),
            None,
            "idp.test",
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No tenant subdomain in host 'idp.test'");
}

#[tokio::test]
async fn test_multi_mode_unknown_subdomain_is_not_found() {
    let app = TestApp::spawn_multi().await;

    let response = app
        .post_json_with_host(
            "/users/sign_in",
            &serde_json::json!({ "email": "alice@example.com", "password": TEST_PASSWORD }),
            None,
            "ghost.idp.test",
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No tenant registered for 'ghost'");
}

#[tokio::test]
async fn test_subdomain_matching_ignores_port_and_case() {
    let app = TestApp::spawn_multi().await;
    app.create_user("alice@example.com").await;

    let response = app
        .post_json_with_host(
            "/users/sign_in",
            &serde_json::json!({ "email": "alice@example.com", "password": TEST_PASSWORD }),
            None,
            "EXAMPLE.idp.test:8443",
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_accounts_are_scoped_to_their_tenant() {
    // 1. Setup: alice exists only in the "example" tenant
    let app = TestApp::spawn_multi().await;
    app.create_tenant("acme").await;
    app.create_user("alice@example.com").await;

    // 2. Correct credentials under the wrong tenant do not sign in
    let response = app
        .post_json_with_host(
            "/users/sign_in",
            &serde_json::json!({ "email": "alice@example.com", "password": TEST_PASSWORD }),
            None,
            "acme.idp.test",
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid email or password.");
}
