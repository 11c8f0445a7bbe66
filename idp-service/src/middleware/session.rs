//! Cookie-session helpers: sign-in state and the [`SessionUser`] extractor.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use idp_core::error::AppError;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{models::{Tenant, User}, AppState};

pub const SESSION_USER_KEY: &str = "user_id";

/// Record the signed-in user in the cookie session.
pub async fn sign_in_session(session: &Session, user_id: Uuid) -> Result<(), AppError> {
    session
        .insert(SESSION_USER_KEY, user_id)
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Session store error: {}", e)))
}

/// Drop the session entirely, including any in-flight ceremony state.
pub async fn sign_out_session(session: &Session) -> Result<(), AppError> {
    session
        .flush()
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Session store error: {}", e)))
}

/// Id of the signed-in session user. Rejects with 401 when no user is
/// signed in.
#[derive(Debug, Clone, Copy)]
pub struct SessionUser(pub Uuid);

#[axum::async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await.map_err(
            |(_, message)| AppError::InternalError(anyhow::anyhow!("Session layer missing: {}", message)),
        )?;

        let user_id: Option<Uuid> = session
            .get(SESSION_USER_KEY)
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Session store error: {}", e)))?;

        user_id
            .map(SessionUser)
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Sign in required")))
    }
}

/// Load the signed-in user's row, scoped to the resolved tenant. A session
/// minted under another tenant does not carry over.
pub async fn load_session_user(
    state: &AppState,
    tenant: &Tenant,
    user_id: Uuid,
) -> Result<User, AppError> {
    let user = state
        .db
        .find_user_by_id(user_id)
        .await
        .map_err(AppError::from)?
        .filter(|u| u.tenant_id == tenant.id)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Sign in required")))?;
    Ok(user)
}
