//! OAuth2 endpoints: token, revoke, introspect, authorize.
//!
//! These speak form-encoding, as OAuth2 clients expect; everything else in
//! this service speaks JSON.

use axum::{extract::State, Form, Json};
use idp_core::error::AppError;
use serde_json::json;

use crate::middleware::{load_session_user, CurrentTenant, SessionUser};
use crate::models::TokenResponse;
use crate::services::{
    AuthorizeRequest, AuthorizeResponse, IntrospectionRequest, IntrospectionResponse,
    RevocationRequest, TokenRequest,
};
use crate::AppState;

/// POST /oauth/token
pub async fn token(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    Form(req): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let response = state.oauth.token(&tenant, req).await?;
    Ok(Json(response))
}

/// POST /oauth/revoke — always 200, even for unknown tokens.
pub async fn revoke(
    State(state): State<AppState>,
    Form(req): Form<RevocationRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.oauth.revoke(req).await?;
    Ok(Json(json!({})))
}

/// POST /oauth/introspect
pub async fn introspect(
    State(state): State<AppState>,
    Form(req): Form<IntrospectionRequest>,
) -> Result<Json<IntrospectionResponse>, AppError> {
    let response = state.oauth.introspect(req).await?;
    Ok(Json(response))
}

/// POST /oauth/authorize — auto-approves for the signed-in session user.
pub async fn authorize(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    SessionUser(user_id): SessionUser,
    Form(req): Form<AuthorizeRequest>,
) -> Result<Json<AuthorizeResponse>, AppError> {
    let user = load_session_user(&state, &tenant, user_id).await?;
    let response = state.oauth.authorize(&user, req).await?;
    Ok(Json(response))
}
