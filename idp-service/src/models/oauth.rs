//! OAuth2 models: registered client applications, bearer access tokens,
//! and single-use authorization grants.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Registered OAuth2 client. `uid` is the public client_id; `secret` is
/// compared in constant time at the token endpoint.
#[derive(Debug, Clone, FromRow)]
pub struct OauthApplication {
    pub id: Uuid,
    pub name: String,
    pub uid: String,
    pub secret: String,
    pub redirect_uri: String,
    pub scopes: String,
    pub confidential: bool,
    pub created_at: DateTime<Utc>,
}

impl OauthApplication {
    pub fn new(name: String, uid: String, secret: String, redirect_uri: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            uid,
            secret,
            redirect_uri,
            scopes: String::new(),
            confidential: true,
            created_at: Utc::now(),
        }
    }
}

/// Opaque bearer token. Valid iff `revoked_at` is NULL and now is before
/// `created_at + expires_in`.
#[derive(Debug, Clone, FromRow)]
pub struct AccessToken {
    pub id: Uuid,
    pub resource_owner_id: Option<Uuid>,
    pub application_id: Uuid,
    pub token: String,
    pub scopes: String,
    pub expires_in: i64,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(self.expires_in)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && !self.is_expired(now)
    }
}

/// Single-use authorization code. Consumption sets `revoked_at`; a consumed
/// or expired grant can never be exchanged again.
#[derive(Debug, Clone, FromRow)]
pub struct AccessGrant {
    pub id: Uuid,
    pub resource_owner_id: Uuid,
    pub application_id: Uuid,
    pub token: String,
    pub expires_in: i64,
    pub redirect_uri: String,
    pub scopes: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AccessGrant {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(self.expires_in)
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now < self.expires_at()
    }
}

/// Token endpoint response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(created_at: DateTime<Utc>, expires_in: i64) -> AccessToken {
        AccessToken {
            id: Uuid::new_v4(),
            resource_owner_id: Some(Uuid::new_v4()),
            application_id: Uuid::new_v4(),
            token: "tok".to_string(),
            scopes: "read".to_string(),
            expires_in,
            created_at,
            revoked_at: None,
        }
    }

    #[test]
    fn token_valid_until_expiry() {
        let now = Utc::now();
        let t = token(now, 7200);
        assert!(t.is_valid(now));
        assert!(!t.is_valid(now + Duration::seconds(7200)));
    }

    #[test]
    fn revoked_token_is_invalid_even_before_expiry() {
        let now = Utc::now();
        let mut t = token(now, 7200);
        t.revoked_at = Some(now);
        assert!(!t.is_valid(now));
    }
}
