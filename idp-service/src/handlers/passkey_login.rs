//! Passkey login: assertion options and assertion verification.

use axum::{extract::State, Json};
use idp_core::error::AppError;
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use validator::Validate;
use webauthn_rs::prelude::{PublicKeyCredential, RequestChallengeResponse};

use crate::handlers::SIGNED_IN_REDIRECT;
use crate::middleware::{sign_in_session, CurrentTenant};
use crate::utils::ValidatedJson;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct PasskeyLoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasskeyAuthenticateRequest {
    pub credential: PublicKeyCredential,
}

/// POST /users/passkey_login
pub async fn begin(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    session: Session,
    ValidatedJson(req): ValidatedJson<PasskeyLoginRequest>,
) -> Result<Json<RequestChallengeResponse>, AppError> {
    let options = state
        .webauthn
        .begin_authentication(&session, &tenant, &req.email)
        .await?;
    Ok(Json(options))
}

/// POST /users/passkey_login/authenticate
pub async fn authenticate(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    session: Session,
    Json(req): Json<PasskeyAuthenticateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = state
        .webauthn
        .finish_authentication(&session, &req.credential)
        .await?;

    // The ceremony was begun tenant-scoped; a finish under another host
    // must not mint a session here.
    if user.tenant_id != tenant.id {
        return Err(AppError::VerificationError(anyhow::anyhow!(
            "Credential not registered"
        )));
    }

    sign_in_session(&session, user.id).await?;

    Ok(Json(json!({
        "success": true,
        "redirect_url": SIGNED_IN_REDIRECT,
    })))
}
