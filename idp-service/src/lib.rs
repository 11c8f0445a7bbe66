//! idp-service: multi-tenant identity provider.
//!
//! Password login, Facebook federation, WebAuthn passkeys, and an OAuth2
//! authorization server, every identity lookup scoped to the tenant
//! resolved for the request.

pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Json, Router,
};
use idp_core::error::AppError;
use idp_core::middleware::security_headers::security_headers_middleware;
use idp_core::middleware::tracing::request_id_middleware;
use sqlx::sqlite::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::{Environment, IdpConfig};
use crate::middleware::{bearer_auth_middleware, tenant_middleware};
use crate::services::{Database, IdentityService, OauthService, TenantResolver, WebauthnEngine};

#[derive(Clone)]
pub struct AppState {
    pub config: IdpConfig,
    pub db: Database,
    pub tenants: Arc<TenantResolver>,
    pub identity: IdentityService,
    pub webauthn: WebauthnEngine,
    pub oauth: OauthService,
}

impl AppState {
    pub fn new(config: IdpConfig, pool: SqlitePool) -> Result<Self, AppError> {
        let db = Database::new(pool);
        let tenants = Arc::new(TenantResolver::from_config(&config.tenancy, db.clone()));
        let identity = IdentityService::new(db.clone());
        let webauthn = WebauthnEngine::new(
            &config.relying_party,
            config.session.challenge_ttl_seconds,
            db.clone(),
        )
        .map_err(AppError::from)?;
        let oauth = OauthService::new(db.clone(), identity.clone(), &config.oauth);

        Ok(Self {
            config,
            db,
            tenants,
            identity,
            webauthn,
            oauth,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    // Bearer-protected API resources
    let api_routes = Router::new()
        .route("/api/v1/me", get(handlers::api::me))
        .route("/api/v1/users/:id", get(handlers::api::show_user))
        .route("/api/v1/tenants/:id", get(handlers::api::show_tenant))
        .layer(from_fn_with_state(state.clone(), bearer_auth_middleware));

    // Browser-facing identity surface (cookie sessions)
    let identity_routes = Router::new()
        .route("/users/sign_in", post(handlers::sessions::sign_in))
        .route("/users/sign_out", delete(handlers::sessions::sign_out))
        .route("/users/my_page", get(handlers::sessions::my_page))
        .route("/users/passkey_login", post(handlers::passkey_login::begin))
        .route(
            "/users/passkey_login/authenticate",
            post(handlers::passkey_login::authenticate),
        )
        .route(
            "/users/passkey_management",
            get(handlers::passkey_management::index).post(handlers::passkey_management::create),
        )
        .route(
            "/users/passkey_management/new",
            get(handlers::passkey_management::options),
        )
        .route(
            "/users/passkey_management/:id",
            delete(handlers::passkey_management::destroy),
        )
        .route(
            "/users/auth/facebook/callback",
            post(handlers::federation::facebook_callback),
        );

    // OAuth2 authorization-server surface (form-encoded)
    let oauth_routes = Router::new()
        .route("/oauth/token", post(handlers::oauth::token))
        .route("/oauth/revoke", post(handlers::oauth::revoke))
        .route("/oauth/introspect", post(handlers::oauth::introspect))
        .route("/oauth/authorize", post(handlers::oauth::authorize));

    // Everything except /health is tenant-scoped
    let tenant_scoped = identity_routes
        .merge(oauth_routes)
        .merge(api_routes)
        .layer(from_fn_with_state(state.clone(), tenant_middleware));

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.environment == Environment::Prod)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            state.config.session.inactivity_minutes,
        )));

    let cors_layer = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .map(|o| {
                    o.parse::<HeaderValue>().unwrap_or_else(|e| {
                        tracing::error!("Invalid CORS origin '{}': {}. Using fallback.", o, e);
                        HeaderValue::from_static("*")
                    })
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .merge(tenant_scoped)
        .with_state(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer)
}

/// Service health check
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "database": "up"
        }
    })))
}
