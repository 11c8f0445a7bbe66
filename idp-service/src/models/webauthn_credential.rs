//! WebAuthn credential model - one row per registered passkey.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Registered passkey. `external_id` is the base64url credential id the
/// authenticator asserts with; `public_key` stores the serialized
/// verification material; `sign_count` is the authenticator's monotonic
/// counter used for clone detection.
#[derive(Debug, Clone, FromRow)]
pub struct WebauthnCredential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub external_id: String,
    pub public_key: String,
    pub nickname: String,
    pub sign_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebauthnCredential {
    pub fn new(
        user_id: Uuid,
        external_id: String,
        public_key: String,
        nickname: String,
        sign_count: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            external_id,
            public_key,
            nickname,
            sign_count,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Credential response for API consumers; the verification key stays
/// server-side.
#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub id: Uuid,
    pub external_id: String,
    pub nickname: String,
    pub sign_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<WebauthnCredential> for CredentialResponse {
    fn from(c: WebauthnCredential) -> Self {
        Self {
            id: c.id,
            external_id: c.external_id,
            nickname: c.nickname,
            sign_count: c.sign_count,
            created_at: c.created_at,
        }
    }
}
