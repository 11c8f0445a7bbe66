//! Bearer-token middleware for the `/api/v1` surface.
//!
//! Every failure mode (missing header, unknown/expired/revoked token,
//! ownerless token, owner outside the resolved tenant) is the same 401.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use idp_core::error::AppError;

use crate::{middleware::tenant::CurrentTenant, models::User, AppState};

/// Resource owner of the presented bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub async fn bearer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let tenant = req
        .extensions()
        .get::<CurrentTenant>()
        .cloned()
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Tenant middleware must run before bearer auth"
            ))
        })?;

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let user = state.oauth.validate_bearer(&tenant.0, token).await?;
    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CurrentUser>().cloned().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "User missing from request extensions; bearer middleware not applied"
            ))
        })
    }
}
