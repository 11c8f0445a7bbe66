//! WebAuthn ceremony engine: passkey registration and authentication.
//!
//! Ceremony state lives in the cookie session, one entry per ceremony type,
//! single-use. A second begin overwrites the first; concurrent tabs are a
//! documented limitation. Sign-count monotonicity is enforced at the
//! storage seam with a guarded UPDATE so the comparison baseline and the
//! write are one atomic statement.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;
use webauthn_rs::prelude::{
    CreationChallengeResponse, CredentialID, Passkey, PasskeyAuthentication,
    PasskeyRegistration, PublicKeyCredential, RegisterPublicKeyCredential,
    RequestChallengeResponse, Url, Webauthn, WebauthnBuilder,
};

use crate::config::RelyingPartyConfig;
use crate::models::{Tenant, User, WebauthnCredential};
use crate::services::{Database, ServiceError};

/// Single message for "user absent" and "user has no passkeys", so the
/// endpoint cannot be used to enumerate accounts.
pub const INVALID_LOGIN_MESSAGE: &str =
    "Invalid username or passkey. Please use password login or set up passkeys in your account settings.";

const REGISTRATION_STATE_KEY: &str = "webauthn_registration_state";
const AUTHENTICATION_STATE_KEY: &str = "webauthn_authentication_state";

#[derive(Serialize, Deserialize)]
struct StoredRegistration {
    state: PasskeyRegistration,
    user_id: Uuid,
    issued_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct StoredAuthentication {
    state: PasskeyAuthentication,
    user_id: Uuid,
    issued_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct WebauthnEngine {
    webauthn: Arc<Webauthn>,
    db: Database,
    challenge_ttl_seconds: i64,
}

impl WebauthnEngine {
    pub fn new(
        rp: &RelyingPartyConfig,
        challenge_ttl_seconds: i64,
        db: Database,
    ) -> Result<Self, ServiceError> {
        let origin = Url::parse(&rp.rp_origin).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!(
                "Invalid relying-party origin '{}': {}",
                rp.rp_origin,
                e
            ))
        })?;

        let webauthn = WebauthnBuilder::new(&rp.rp_id, &origin)?
            .rp_name(&rp.rp_name)
            .build()?;

        Ok(Self {
            webauthn: Arc::new(webauthn),
            db,
            challenge_ttl_seconds,
        })
    }

    // ==================== Registration ====================

    /// Issue creation options for a signed-in user. Existing credential ids
    /// are excluded so the same authenticator cannot register twice.
    pub async fn begin_registration(
        &self,
        session: &Session,
        user: &User,
    ) -> Result<CreationChallengeResponse, ServiceError> {
        let existing = self.db.find_credentials_by_user(user.id).await?;
        let exclude: Vec<CredentialID> = existing
            .iter()
            .filter_map(|c| URL_SAFE_NO_PAD.decode(&c.external_id).ok())
            .map(CredentialID::from)
            .collect();
        let exclude = (!exclude.is_empty()).then_some(exclude);

        let (options, state) = self.webauthn.start_passkey_registration(
            user.id,
            &user.email,
            user.display_name(),
            exclude,
        )?;

        let stored = StoredRegistration {
            state,
            user_id: user.id,
            issued_at: Utc::now(),
        };
        session
            .insert(REGISTRATION_STATE_KEY, stored)
            .await
            .map_err(session_error)?;

        Ok(options)
    }

    /// Verify an attestation response and persist the new passkey.
    ///
    /// The session entry is consumed before verification, so the ceremony
    /// is single-use whether or not verification succeeds.
    pub async fn finish_registration(
        &self,
        session: &Session,
        user: &User,
        credential: &RegisterPublicKeyCredential,
        nickname: Option<String>,
    ) -> Result<WebauthnCredential, ServiceError> {
        let stored: StoredRegistration = session
            .remove(REGISTRATION_STATE_KEY)
            .await
            .map_err(session_error)?
            .ok_or_else(|| {
                ServiceError::Verification("No registration ceremony in progress".to_string())
            })?;

        if stored.user_id != user.id {
            return Err(ServiceError::Verification(
                "Registration ceremony belongs to a different user".to_string(),
            ));
        }
        self.ensure_fresh(stored.issued_at)?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(credential, &stored.state)?;

        let external_id = URL_SAFE_NO_PAD.encode(passkey.cred_id());
        let public_key = serde_json::to_string(&passkey)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Passkey serialization: {}", e)))?;
        let sign_count = initial_sign_count(&passkey);

        let nickname = match nickname.filter(|n| !n.trim().is_empty()) {
            Some(n) => n,
            None => default_nickname(self.db.find_credentials_by_user(user.id).await?.len()),
        };

        let row = WebauthnCredential::new(user.id, external_id, public_key, nickname, sign_count);
        self.db.insert_credential(&row).await?;

        tracing::info!(user_id = %user.id, credential_id = %row.id, "Passkey registered");
        Ok(row)
    }

    // ==================== Authentication ====================

    /// Issue assertion options for an email within the current tenant.
    ///
    /// Unknown email and zero registered credentials fail identically with
    /// [`INVALID_LOGIN_MESSAGE`].
    pub async fn begin_authentication(
        &self,
        session: &Session,
        tenant: &Tenant,
        email: &str,
    ) -> Result<RequestChallengeResponse, ServiceError> {
        let user = self
            .db
            .find_user_by_email_in_tenant(tenant.id, email)
            .await?
            .ok_or_else(|| ServiceError::NotFound(INVALID_LOGIN_MESSAGE.to_string()))?;

        let rows = self.db.find_credentials_by_user(user.id).await?;
        if rows.is_empty() {
            return Err(ServiceError::NotFound(INVALID_LOGIN_MESSAGE.to_string()));
        }

        let passkeys = rows
            .iter()
            .map(|c| serde_json::from_str::<Passkey>(&c.public_key))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                ServiceError::Internal(anyhow::anyhow!("Stored credential is corrupt: {}", e))
            })?;

        let (options, state) = self.webauthn.start_passkey_authentication(&passkeys)?;

        let stored = StoredAuthentication {
            state,
            user_id: user.id,
            issued_at: Utc::now(),
        };
        session
            .insert(AUTHENTICATION_STATE_KEY, stored)
            .await
            .map_err(session_error)?;

        Ok(options)
    }

    /// Verify an assertion and advance the credential's sign count.
    ///
    /// Returns the authenticated user. The counter write is guarded: zero
    /// rows updated means the reported count did not advance past the
    /// stored one (both-zero excepted) and the assertion is rejected as a
    /// possible cloned authenticator.
    pub async fn finish_authentication(
        &self,
        session: &Session,
        credential: &PublicKeyCredential,
    ) -> Result<User, ServiceError> {
        let stored: StoredAuthentication = session
            .remove(AUTHENTICATION_STATE_KEY)
            .await
            .map_err(session_error)?
            .ok_or_else(|| {
                ServiceError::Verification("No authentication ceremony in progress".to_string())
            })?;

        self.ensure_fresh(stored.issued_at)?;

        let result = self
            .webauthn
            .finish_passkey_authentication(credential, &stored.state)?;

        let external_id = URL_SAFE_NO_PAD.encode(result.cred_id());
        let row = self
            .db
            .find_credential_by_external_id(&external_id)
            .await?
            .filter(|c| c.user_id == stored.user_id)
            .ok_or_else(|| ServiceError::NotFound("Credential not registered".to_string()))?;

        let mut passkey: Passkey = serde_json::from_str(&row.public_key).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Stored credential is corrupt: {}", e))
        })?;
        let _ = passkey.update_credential(&result);

        let new_count = i64::from(result.counter());
        let serialized = serde_json::to_string(&passkey)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Passkey serialization: {}", e)))?;

        let updated = self
            .db
            .update_credential_after_authentication(row.id, new_count, &serialized)
            .await?;
        if updated == 0 {
            tracing::warn!(
                credential_id = %row.id,
                stored_count = row.sign_count,
                reported_count = new_count,
                "Sign count did not advance; rejecting assertion"
            );
            return Err(ServiceError::Verification(
                "Sign count did not advance; assertion rejected".to_string(),
            ));
        }

        let user = self
            .db
            .find_user_by_id(stored.user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        tracing::info!(user_id = %user.id, credential_id = %row.id, "Passkey authentication verified");
        Ok(user)
    }

    fn ensure_fresh(&self, issued_at: DateTime<Utc>) -> Result<(), ServiceError> {
        if Utc::now() - issued_at > Duration::seconds(self.challenge_ttl_seconds) {
            return Err(ServiceError::Verification(
                "Challenge has expired".to_string(),
            ));
        }
        Ok(())
    }
}

fn session_error(e: tower_sessions::session::Error) -> ServiceError {
    ServiceError::Internal(anyhow::anyhow!("Session store error: {}", e))
}

fn default_nickname(existing: usize) -> String {
    format!("Passkey {}", existing + 1)
}

/// Authenticator-reported counter at registration time, read from the
/// serialized passkey. Most authenticators report zero here.
fn initial_sign_count(passkey: &Passkey) -> i64 {
    serde_json::to_value(passkey)
        .ok()
        .and_then(|v| v.pointer("/cred/counter").and_then(|c| c.as_u64()))
        .unwrap_or(0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_passkey_is_number_one() {
        assert_eq!(default_nickname(0), "Passkey 1");
        assert_eq!(default_nickname(2), "Passkey 3");
    }

    #[tokio::test]
    async fn engine_rejects_malformed_origin() {
        let rp = RelyingPartyConfig {
            rp_id: "localhost".to_string(),
            rp_origin: "not a url".to_string(),
            rp_name: "Test".to_string(),
        };
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_lazy("sqlite::memory:")
            .unwrap();
        let result = WebauthnEngine::new(&rp, 120, Database::new(pool));
        assert!(result.is_err());
    }
}
