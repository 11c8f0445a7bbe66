//! Tenant context middleware.
//!
//! Runs before everything else on tenant-scoped routes: resolves the
//! active tenant from the Host header and stores it in request extensions
//! for handlers to read through the [`CurrentTenant`] extractor.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use idp_core::error::AppError;

use crate::{models::Tenant, AppState};

/// Tenant resolved for the current request.
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub Tenant);

pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let tenant = state.tenants.resolve(host).await?;
    req.extensions_mut().insert(CurrentTenant(tenant));

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CurrentTenant>().cloned().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Tenant missing from request extensions; tenant middleware not applied"
            ))
        })
    }
}
