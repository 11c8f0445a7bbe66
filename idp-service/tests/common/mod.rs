//! Test helpers for the identity-provider integration tests.
//!
//! Every test drives the real router against a fresh in-memory SQLite
//! database, so the suite is hermetic: no external services, no shared
//! state between tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use idp_service::{
    build_router,
    config::{
        DatabaseConfig, Environment, FacebookConfig, IdpConfig, OauthConfig, RelyingPartyConfig,
        SecurityConfig, SessionConfig, TenancyConfig,
    },
    db,
    models::{AccessGrant, AccessToken, OauthApplication, Tenant, TenantMode, TenantType, User},
    utils::generate_token,
    AppState,
};
use sqlx::sqlite::SqlitePoolOptions;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "password123";
pub const TENANT_NAME: &str = "example";
pub const CLIENT_ID: &str = "client-uid";
pub const CLIENT_SECRET: &str = "client-secret";
pub const REDIRECT_URI: &str = "https://client.example.com/callback";
pub const FACEBOOK_SECRET: &str = "facebook_test_secret";

/// Host that resolves in both tenancy modes: ignored in single mode,
/// subdomain "example" in multi mode.
pub const TEST_HOST: &str = "example.idp.test";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub tenant: Tenant,
    pub application: OauthApplication,
}

impl TestApp {
    /// Single-tenant deployment serving the tenant "example".
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config(TenantMode::Single)).await
    }

    /// Multi-tenant deployment resolving tenants by subdomain.
    pub async fn spawn_multi() -> Self {
        Self::spawn_with(test_config(TenantMode::Multi)).await
    }

    /// Single-tenant deployment with a custom ceremony challenge TTL.
    pub async fn spawn_with_challenge_ttl(seconds: i64) -> Self {
        let mut config = test_config(TenantMode::Single);
        config.session.challenge_ttl_seconds = seconds;
        Self::spawn_with(config).await
    }

    async fn spawn_with(config: IdpConfig) -> Self {
        // One persistent connection keeps the in-memory database alive for
        // the lifetime of the test.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory SQLite");
        db::run_migrations(&pool).await.expect("Failed to migrate");

        let mode = config.tenancy.mode;
        let state = AppState::new(config, pool).expect("Failed to build app state");

        let tenant = Tenant::new(TENANT_NAME.to_string(), mode);
        state.db.insert_tenant(&tenant).await.expect("Failed to seed tenant");

        let application = OauthApplication::new(
            "Test Client".to_string(),
            CLIENT_ID.to_string(),
            CLIENT_SECRET.to_string(),
            REDIRECT_URI.to_string(),
        );
        state
            .db
            .insert_application(&application)
            .await
            .expect("Failed to seed client application");

        let router = build_router(state.clone());

        Self {
            router,
            state,
            tenant,
            application,
        }
    }

    // ==================== Seeding ====================

    pub async fn create_user(&self, email: &str) -> User {
        self.create_user_in(&self.tenant, email).await
    }

    pub async fn create_user_in(&self, tenant: &Tenant, email: &str) -> User {
        self.state
            .identity
            .create_user(tenant, email, TEST_PASSWORD, None)
            .await
            .expect("Failed to seed user")
    }

    pub async fn create_tenant(&self, name: &str) -> Tenant {
        let tenant = Tenant::new(name.to_string(), TenantMode::Multi);
        self.state
            .db
            .insert_tenant(&tenant)
            .await
            .expect("Failed to seed tenant");
        tenant
    }

    pub async fn issue_token(&self, user: &User, scopes: &str) -> AccessToken {
        self.issue_token_with_expiry(user, scopes, 7200).await
    }

    pub async fn issue_token_with_expiry(
        &self,
        user: &User,
        scopes: &str,
        expires_in: i64,
    ) -> AccessToken {
        let token = AccessToken {
            id: Uuid::new_v4(),
            resource_owner_id: Some(user.id),
            application_id: self.application.id,
            token: generate_token(),
            scopes: scopes.to_string(),
            expires_in,
            created_at: Utc::now(),
            revoked_at: None,
        };
        self.state
            .db
            .insert_access_token(&token)
            .await
            .expect("Failed to seed access token");
        token
    }

    /// Token with no resource owner, as client_credentials issues them.
    pub async fn issue_client_token(&self, scopes: &str) -> AccessToken {
        let token = AccessToken {
            id: Uuid::new_v4(),
            resource_owner_id: None,
            application_id: self.application.id,
            token: generate_token(),
            scopes: scopes.to_string(),
            expires_in: 7200,
            created_at: Utc::now(),
            revoked_at: None,
        };
        self.state
            .db
            .insert_access_token(&token)
            .await
            .expect("Failed to seed access token");
        token
    }

    pub async fn issue_grant(&self, user: &User) -> AccessGrant {
        self.issue_grant_with_expiry(user, 600).await
    }

    pub async fn issue_grant_with_expiry(&self, user: &User, expires_in: i64) -> AccessGrant {
        let grant = AccessGrant {
            id: Uuid::new_v4(),
            resource_owner_id: user.id,
            application_id: self.application.id,
            token: generate_token(),
            expires_in,
            redirect_uri: REDIRECT_URI.to_string(),
            scopes: "read".to_string(),
            created_at: Utc::now(),
            revoked_at: None,
        };
        self.state
            .db
            .insert_access_grant(&grant)
            .await
            .expect("Failed to seed access grant");
        grant
    }

    // ==================== Requests ====================

    pub async fn request(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.expect("Request failed")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::HOST, TEST_HOST);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn get_bearer(&self, uri: &str, token: &str) -> Response {
        self.get_bearer_with_host(uri, token, TEST_HOST).await
    }

    pub async fn get_bearer_with_host(&self, uri: &str, token: &str, host: &str) -> Response {
        let req = Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::HOST, host)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        self.request(req).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: &serde_json::Value,
        cookie: Option<&str>,
    ) -> Response {
        self.post_json_with_host(uri, body, cookie, TEST_HOST).await
    }

    pub async fn post_json_with_host(
        &self,
        uri: &str,
        body: &serde_json::Value,
        cookie: Option<&str>,
        host: &str,
    ) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::HOST, host)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post_form(
        &self,
        uri: &str,
        pairs: &[(&str, &str)],
        cookie: Option<&str>,
    ) -> Response {
        self.post_form_with_host(uri, pairs, cookie, TEST_HOST).await
    }

    pub async fn post_form_with_host(
        &self,
        uri: &str,
        pairs: &[(&str, &str)],
        cookie: Option<&str>,
        host: &str,
    ) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::HOST, host)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::from(form_body(pairs))).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header(header::HOST, TEST_HOST);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    /// Sign in through the real endpoint and return the session cookie.
    pub async fn sign_in(&self, email: &str) -> String {
        let response = self
            .post_json(
                "/users/sign_in",
                &serde_json::json!({ "email": email, "password": TEST_PASSWORD }),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "sign-in failed in test setup");
        session_cookie(&response).expect("sign-in did not set a session cookie")
    }
}

fn test_config(mode: TenantMode) -> IdpConfig {
    IdpConfig {
        common: idp_core::config::Config {
            port: 8080,
            bind_address: "127.0.0.1".to_string(),
        },
        environment: Environment::Dev,
        service_name: "idp-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        tenancy: TenancyConfig {
            mode,
            tenant_name: Some(TENANT_NAME.to_string()),
            resolution: TenantType::Subdomain,
        },
        relying_party: RelyingPartyConfig {
            rp_id: "idp.test".to_string(),
            rp_origin: "https://idp.test".to_string(),
            rp_name: "Test IdP".to_string(),
        },
        facebook: FacebookConfig {
            app_secret: FACEBOOK_SECRET.to_string(),
        },
        oauth: OauthConfig {
            access_token_ttl_seconds: 7200,
            grant_ttl_seconds: 600,
            default_scope: "read".to_string(),
            oidc_issuer: "https://idp.test".to_string(),
            oidc_signing_key: "test_secret_key_for_openid_connect".to_string(),
        },
        session: SessionConfig {
            inactivity_minutes: 60,
            challenge_ttl_seconds: 120,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

/// Cookie pair from the response's Set-Cookie header, ready to send back.
pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|pair| pair.to_string())
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body was not valid JSON")
}

pub fn form_body(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}
