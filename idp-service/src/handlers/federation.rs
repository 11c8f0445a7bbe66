//! Facebook federation callback.
//!
//! Accepts a Facebook `signed_request`: base64url(HMAC-SHA256 signature)
//! "." base64url(JSON payload), verified against the configured app
//! secret. A verified payload flows through `from_omniauth` and signs the
//! browser session in.

use axum::{extract::State, Json};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use idp_core::error::AppError;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tower_sessions::Session;
use validator::Validate;

use crate::handlers::SIGNED_IN_REDIRECT;
use crate::middleware::{sign_in_session, CurrentTenant};
use crate::services::FederatedProfile;
use crate::utils::ValidatedJson;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const FACEBOOK_PROVIDER: &str = "facebook";

#[derive(Debug, Deserialize, Validate)]
pub struct FacebookCallbackRequest {
    #[validate(length(min = 1))]
    pub signed_request: String,
}

/// Claims Facebook places in a signed_request payload.
#[derive(Debug, Deserialize)]
pub struct FacebookPayload {
    pub algorithm: String,
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
}

/// POST /users/auth/facebook/callback
pub async fn facebook_callback(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    session: Session,
    ValidatedJson(req): ValidatedJson<FacebookCallbackRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let payload = verify_signed_request(&req.signed_request, &state.config.facebook.app_secret)?;

    let email = payload
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("signed_request carries no email")))?;

    let profile = FederatedProfile {
        provider: FACEBOOK_PROVIDER.to_string(),
        uid: payload.user_id,
        email,
        name: payload.name,
        image: payload.image,
    };

    let user = state.identity.from_omniauth(profile, &tenant).await?;
    sign_in_session(&session, user.id).await?;
    tracing::info!(user_id = %user.id, tenant_id = %tenant.id, "Facebook sign-in");

    Ok(Json(json!({
        "success": true,
        "redirect_url": SIGNED_IN_REDIRECT,
    })))
}

/// Split, verify, and decode a signed_request. Every malformation is the
/// same 401; nothing in the payload is trusted before the MAC checks out.
pub fn verify_signed_request(
    signed_request: &str,
    app_secret: &str,
) -> Result<FacebookPayload, AppError> {
    let (signature_b64, payload_b64) = signed_request
        .split_once('.')
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Malformed signed_request")))?;

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Malformed signed_request")))?;

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("HMAC key error: {}", e)))?;
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature).map_err(|_| {
        AppError::Unauthorized(anyhow::anyhow!("Invalid signed_request signature"))
    })?;

    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Malformed signed_request")))?;

    let payload: FacebookPayload = serde_json::from_slice(&payload_json)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Malformed signed_request payload")))?;

    if !payload.algorithm.eq_ignore_ascii_case("HMAC-SHA256") {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Unsupported signed_request algorithm"
        )));
    }

    Ok(payload)
}
