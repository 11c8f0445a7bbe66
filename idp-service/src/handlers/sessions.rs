//! Password session login, logout, and the signed-in profile page.

use axum::{extract::State, response::Redirect, Json};
use idp_core::error::AppError;
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use validator::Validate;

use crate::handlers::SIGNED_IN_REDIRECT;
use crate::middleware::{
    load_session_user, sign_in_session, sign_out_session, CurrentTenant, SessionUser,
};
use crate::models::UserResponse;
use crate::utils::ValidatedJson;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// POST /users/sign_in
pub async fn sign_in(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    session: Session,
    ValidatedJson(req): ValidatedJson<SignInRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = state
        .identity
        .authenticate_password(&tenant, &req.email, &req.password)
        .await?;

    sign_in_session(&session, user.id).await?;
    tracing::info!(user_id = %user.id, tenant_id = %tenant.id, "Password sign-in");

    Ok(Json(json!({
        "success": true,
        "redirect_url": SIGNED_IN_REDIRECT,
    })))
}

/// DELETE /users/sign_out
pub async fn sign_out(session: Session) -> Result<Redirect, AppError> {
    sign_out_session(&session).await?;
    Ok(Redirect::to("/"))
}

/// GET /users/my_page
pub async fn my_page(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    SessionUser(user_id): SessionUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = load_session_user(&state, &tenant, user_id).await?;
    Ok(Json(user.sanitized()))
}
