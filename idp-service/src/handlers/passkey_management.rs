//! Passkey management for the signed-in user: list, register, revoke.

use axum::{
    extract::{Path, State},
    response::Redirect,
    Json,
};
use idp_core::error::AppError;
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;
use webauthn_rs::prelude::{CreationChallengeResponse, RegisterPublicKeyCredential};

use crate::middleware::{load_session_user, CurrentTenant, SessionUser};
use crate::models::CredentialResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PasskeyCreateRequest {
    pub credential: RegisterPublicKeyCredential,
    pub nickname: Option<String>,
}

/// GET /users/passkey_management
pub async fn index(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    SessionUser(user_id): SessionUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = load_session_user(&state, &tenant, user_id).await?;
    let credentials: Vec<CredentialResponse> = state
        .db
        .find_credentials_by_user(user.id)
        .await
        .map_err(AppError::from)?
        .into_iter()
        .map(CredentialResponse::from)
        .collect();

    Ok(Json(json!({ "credentials": credentials })))
}

/// GET /users/passkey_management/new
pub async fn options(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    SessionUser(user_id): SessionUser,
    session: Session,
) -> Result<Json<CreationChallengeResponse>, AppError> {
    let user = load_session_user(&state, &tenant, user_id).await?;
    let options = state.webauthn.begin_registration(&session, &user).await?;
    Ok(Json(options))
}

/// POST /users/passkey_management
pub async fn create(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    SessionUser(user_id): SessionUser,
    session: Session,
    Json(req): Json<PasskeyCreateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = load_session_user(&state, &tenant, user_id).await?;
    let credential = state
        .webauthn
        .finish_registration(&session, &user, &req.credential, req.nickname)
        .await?;

    Ok(Json(json!({
        "success": true,
        "credential": CredentialResponse::from(credential),
    })))
}

/// DELETE /users/passkey_management/:id
///
/// Foreign and unknown ids are indistinguishable: both 404.
pub async fn destroy(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    SessionUser(user_id): SessionUser,
    Path(credential_id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let user = load_session_user(&state, &tenant, user_id).await?;

    let credential = state
        .db
        .find_credential_by_id(credential_id)
        .await
        .map_err(AppError::from)?
        .filter(|c| c.user_id == user.id)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Credential not found")))?;

    state
        .db
        .delete_credential(credential.id)
        .await
        .map_err(AppError::from)?;
    tracing::info!(user_id = %user.id, credential_id = %credential.id, "Passkey revoked");

    Ok(Redirect::to("/users/passkey_management"))
}
