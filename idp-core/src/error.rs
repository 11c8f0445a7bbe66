use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Transport-level error for every HTTP surface in the workspace.
///
/// Domain services convert their own error enums into this type; the
/// `IntoResponse` impl is the single place that decides status codes and
/// the JSON error body. OAuth2 variants carry the standard `error` code in
/// the body (`invalid_request`, `invalid_grant`, `invalid_client`,
/// `unsupported_grant_type`) with the human-readable message in
/// `error_description`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Invalid tenant: {0}")]
    InvalidTenant(anyhow::Error),

    #[error("Verification failed: {0}")]
    VerificationError(anyhow::Error),

    #[error("invalid_request: {0}")]
    InvalidRequest(anyhow::Error),

    #[error("invalid_grant: {0}")]
    InvalidGrant(anyhow::Error),

    #[error("invalid_client: {0}")]
    InvalidClient(anyhow::Error),

    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, error_description, details) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation error".to_string(),
                None,
                Some(err.to_string()),
            ),
            AppError::BadRequest(err) => {
                (StatusCode::BAD_REQUEST, err.to_string(), None, None)
            }
            AppError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string(), None, None),
            AppError::Unauthorized(err) => {
                (StatusCode::UNAUTHORIZED, err.to_string(), None, None)
            }
            AppError::Forbidden(err) => (StatusCode::FORBIDDEN, err.to_string(), None, None),
            AppError::Conflict(err) => (StatusCode::CONFLICT, err.to_string(), None, None),
            AppError::InvalidTenant(err) => {
                (StatusCode::BAD_REQUEST, err.to_string(), None, None)
            }
            AppError::VerificationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                err.to_string(),
                None,
                None,
            ),
            AppError::InvalidRequest(err) => (
                StatusCode::BAD_REQUEST,
                "invalid_request".to_string(),
                Some(err.to_string()),
                None,
            ),
            AppError::InvalidGrant(err) => (
                StatusCode::BAD_REQUEST,
                "invalid_grant".to_string(),
                Some(err.to_string()),
                None,
            ),
            AppError::InvalidClient(err) => (
                StatusCode::UNAUTHORIZED,
                "invalid_client".to_string(),
                Some(err.to_string()),
                None,
            ),
            AppError::UnsupportedGrantType(grant_type) => (
                StatusCode::BAD_REQUEST,
                "unsupported_grant_type".to_string(),
                Some(format!("Unknown grant type: {}", grant_type)),
                None,
            ),
            AppError::InternalError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                None,
                Some(err.to_string()),
            ),
            AppError::DatabaseError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                None,
                Some(err.to_string()),
            ),
            AppError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
                None,
                Some(err.to_string()),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                error_description,
                details,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn oauth_variants_use_standard_error_codes() {
        let res = AppError::InvalidGrant(anyhow::anyhow!("bad credentials")).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = AppError::InvalidClient(anyhow::anyhow!("unknown client")).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = AppError::InvalidRequest(anyhow::anyhow!("missing grant_type")).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn verification_errors_are_unprocessable() {
        let res = AppError::VerificationError(anyhow::anyhow!("challenge mismatch"))
            .into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
