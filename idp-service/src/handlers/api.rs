//! Bearer-protected `/api/v1` resources.

use axum::{
    extract::{Path, State},
    Json,
};
use idp_core::error::AppError;
use uuid::Uuid;

use crate::middleware::CurrentUser;
use crate::models::{TenantResponse, UserResponse};
use crate::services::Policy;
use crate::AppState;

/// GET /api/v1/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.sanitized())
}

/// GET /api/v1/users/:id — policy allows reading only yourself.
pub async fn show_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    Policy::can_read_user(&user, user_id)?;

    let target = state
        .db
        .find_user_by_id(user_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    Ok(Json(target.sanitized()))
}

/// GET /api/v1/tenants/:id — policy allows reading only your own tenant.
pub async fn show_tenant(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<TenantResponse>, AppError> {
    Policy::can_read_tenant(&user, tenant_id)?;

    let tenant = state
        .db
        .find_tenant_by_id(tenant_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Tenant not found")))?;

    Ok(Json(TenantResponse::from(tenant)))
}
