use idp_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Sign in required")]
    Unauthenticated,

    #[error("You are not authorized to access this page.")]
    Forbidden,

    #[error("{0}")]
    InvalidTenant(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Verification(String),

    #[error("WebAuthn ceremony failed: {0}")]
    Webauthn(#[from] webauthn_rs::prelude::WebauthnError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    InvalidGrant(String),

    #[error("{0}")]
    InvalidClient(String),

    #[error("Unknown grant type: {0}")]
    UnsupportedGrantType(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidCredentials => {
                AppError::VerificationError(anyhow::anyhow!("Invalid email or password."))
            }
            ServiceError::Unauthenticated => {
                AppError::Unauthorized(anyhow::anyhow!("Sign in required"))
            }
            ServiceError::Forbidden => AppError::Forbidden(anyhow::anyhow!(
                "You are not authorized to access this page."
            )),
            ServiceError::InvalidTenant(e) => AppError::InvalidTenant(anyhow::anyhow!(e)),
            ServiceError::NotFound(e) => AppError::NotFound(anyhow::anyhow!(e)),
            ServiceError::Conflict(e) => AppError::Conflict(anyhow::anyhow!(e)),
            ServiceError::Verification(e) => AppError::VerificationError(anyhow::anyhow!(e)),
            ServiceError::Webauthn(e) => AppError::VerificationError(anyhow::Error::new(e)),
            // Domain validation renders 422 like the validator-derive path
            ServiceError::Validation(e) => AppError::VerificationError(anyhow::anyhow!(e)),
            ServiceError::InvalidRequest(e) => AppError::InvalidRequest(anyhow::anyhow!(e)),
            ServiceError::InvalidGrant(e) => AppError::InvalidGrant(anyhow::anyhow!(e)),
            ServiceError::InvalidClient(e) => AppError::InvalidClient(anyhow::anyhow!(e)),
            ServiceError::UnsupportedGrantType(g) => AppError::UnsupportedGrantType(g),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn credential_failures_map_to_unprocessable() {
        let app: AppError = ServiceError::InvalidCredentials.into();
        assert_eq!(
            app.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn oauth_client_failures_map_to_unauthorized() {
        let app: AppError = ServiceError::InvalidClient("unknown client".to_string()).into();
        assert_eq!(app.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn tenant_failures_map_to_bad_request() {
        let app: AppError = ServiceError::InvalidTenant("no subdomain".to_string()).into();
        assert_eq!(app.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
