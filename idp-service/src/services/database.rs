//! SQLite database service for the identity provider.
//!
//! Thin query layer over sqlx; all multi-step invariants (single-use
//! grants, revocation races, sign-count monotonicity) are enforced here
//! with guarded UPDATEs so they stay atomic per row.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::models::{AccessGrant, AccessToken, OauthApplication, Tenant, User, WebauthnCredential};
use crate::services::error::ServiceError;

/// SQLite database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            ServiceError::Database(e)
        })?;
        Ok(())
    }

    // ==================== Tenant Operations ====================

    /// Find tenant by ID.
    pub async fn find_tenant_by_id(&self, tenant_id: Uuid) -> Result<Option<Tenant>, ServiceError> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    /// Find tenant by name. Names are stored lowercase and matched exactly.
    pub async fn find_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>, ServiceError> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    /// Insert a new tenant.
    pub async fn insert_tenant(&self, tenant: &Tenant) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, address, web, tenant_mode, tenant_type, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.address)
        .bind(&tenant.web)
        .bind(&tenant.tenant_mode)
        .bind(&tenant.tenant_type)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("Name has already been taken"))?;
        Ok(())
    }

    // ==================== User Operations ====================

    /// Find user by ID.
    pub async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Find user by email within a tenant.
    pub async fn find_user_by_email_in_tenant(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Option<User>, ServiceError> {
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE tenant_id = ? AND email = ?")
                .bind(tenant_id)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    /// Find user by federated (provider, uid) pair. The pair is unique
    /// across tenants, so the lookup is global.
    pub async fn find_user_by_provider_uid(
        &self,
        provider: &str,
        uid: &str,
    ) -> Result<Option<User>, ServiceError> {
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE provider = ? AND uid = ?")
                .bind(provider)
                .bind(uid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    /// Insert a new user.
    pub async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, tenant_id, email, encrypted_password, provider, uid, name, image, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id)
        .bind(user.tenant_id)
        .bind(&user.email)
        .bind(&user.encrypted_password)
        .bind(&user.provider)
        .bind(&user.uid)
        .bind(&user.name)
        .bind(&user.image)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("Email has already been taken"))?;
        Ok(())
    }

    /// Attach a federated identity to an existing account.
    pub async fn update_user_federated_identity(
        &self,
        user_id: Uuid,
        provider: &str,
        uid: &str,
        name: Option<&str>,
        image: Option<&str>,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            UPDATE users
            SET provider = ?, uid = ?, name = COALESCE(?, name), image = COALESCE(?, image), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(provider)
        .bind(uid)
        .bind(name)
        .bind(image)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a user together with every credential, token, and grant that
    /// references it. Runs in one transaction.
    pub async fn delete_user_cascade(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM oauth_access_tokens WHERE resource_owner_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM oauth_access_grants WHERE resource_owner_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM webauthn_credentials WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    // ==================== WebAuthn Credential Operations ====================

    /// Insert a registered passkey.
    pub async fn insert_credential(
        &self,
        credential: &WebauthnCredential,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO webauthn_credentials (id, user_id, external_id, public_key, nickname, sign_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(credential.id)
        .bind(credential.user_id)
        .bind(&credential.external_id)
        .bind(&credential.public_key)
        .bind(&credential.nickname)
        .bind(credential.sign_count)
        .bind(credential.created_at)
        .bind(credential.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("Credential is already registered"))?;
        Ok(())
    }

    /// Find credential by ID.
    pub async fn find_credential_by_id(
        &self,
        credential_id: Uuid,
    ) -> Result<Option<WebauthnCredential>, ServiceError> {
        let credential = sqlx::query_as::<_, WebauthnCredential>(
            "SELECT * FROM webauthn_credentials WHERE id = ?",
        )
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credential)
    }

    /// Find credential by the authenticator's base64url credential id.
    pub async fn find_credential_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<WebauthnCredential>, ServiceError> {
        let credential = sqlx::query_as::<_, WebauthnCredential>(
            "SELECT * FROM webauthn_credentials WHERE external_id = ?",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credential)
    }

    /// All passkeys registered by a user, oldest first.
    pub async fn find_credentials_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<WebauthnCredential>, ServiceError> {
        let credentials = sqlx::query_as::<_, WebauthnCredential>(
            "SELECT * FROM webauthn_credentials WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(credentials)
    }

    /// Advance a credential's sign count and verification material after a
    /// successful assertion.
    ///
    /// The WHERE clause enforces counter monotonicity: the update only
    /// applies when the new count is strictly greater than the stored one,
    /// except when both are zero (authenticators that never increment).
    /// Returns the number of rows updated; zero means the assertion must be
    /// rejected as a possible cloned authenticator.
    pub async fn update_credential_after_authentication(
        &self,
        credential_id: Uuid,
        new_sign_count: i64,
        new_public_key: &str,
    ) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE webauthn_credentials
            SET sign_count = ?, public_key = ?, updated_at = ?
            WHERE id = ? AND (sign_count < ? OR (sign_count = 0 AND ? = 0))
            "#,
        )
        .bind(new_sign_count)
        .bind(new_public_key)
        .bind(Utc::now())
        .bind(credential_id)
        .bind(new_sign_count)
        .bind(new_sign_count)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete a credential. Returns the number of rows removed.
    pub async fn delete_credential(&self, credential_id: Uuid) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM webauthn_credentials WHERE id = ?")
            .bind(credential_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ==================== OAuth Application Operations ====================

    /// Find a client application by its row id.
    pub async fn find_application_by_id(
        &self,
        application_id: Uuid,
    ) -> Result<Option<OauthApplication>, ServiceError> {
        let app =
            sqlx::query_as::<_, OauthApplication>("SELECT * FROM oauth_applications WHERE id = ?")
                .bind(application_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(app)
    }

    /// Find a client application by its public client_id.
    pub async fn find_application_by_uid(
        &self,
        uid: &str,
    ) -> Result<Option<OauthApplication>, ServiceError> {
        let app =
            sqlx::query_as::<_, OauthApplication>("SELECT * FROM oauth_applications WHERE uid = ?")
                .bind(uid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(app)
    }

    /// Insert a client application.
    pub async fn insert_application(&self, app: &OauthApplication) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_applications (id, name, uid, secret, redirect_uri, scopes, confidential, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(app.id)
        .bind(&app.name)
        .bind(&app.uid)
        .bind(&app.secret)
        .bind(&app.redirect_uri)
        .bind(&app.scopes)
        .bind(app.confidential)
        .bind(app.created_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("Client uid has already been taken"))?;
        Ok(())
    }

    // ==================== Access Token Operations ====================

    /// Insert an access token.
    pub async fn insert_access_token(&self, token: &AccessToken) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_access_tokens (id, resource_owner_id, application_id, token, scopes, expires_in, created_at, revoked_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(token.id)
        .bind(token.resource_owner_id)
        .bind(token.application_id)
        .bind(&token.token)
        .bind(&token.scopes)
        .bind(token.expires_in)
        .bind(token.created_at)
        .bind(token.revoked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Find an access token by its opaque string.
    pub async fn find_access_token(
        &self,
        token: &str,
    ) -> Result<Option<AccessToken>, ServiceError> {
        let access_token =
            sqlx::query_as::<_, AccessToken>("SELECT * FROM oauth_access_tokens WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(access_token)
    }

    /// Revoke an access token. The guarded UPDATE only touches tokens that
    /// are not yet revoked, so a revoke racing a validate resolves to one
    /// consistent outcome. Returns the number of rows updated.
    pub async fn revoke_access_token(
        &self,
        token: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            "UPDATE oauth_access_tokens SET revoked_at = ? WHERE token = ? AND revoked_at IS NULL",
        )
        .bind(revoked_at)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ==================== Access Grant Operations ====================

    /// Insert an authorization grant.
    pub async fn insert_access_grant(&self, grant: &AccessGrant) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_access_grants (id, resource_owner_id, application_id, token, expires_in, redirect_uri, scopes, created_at, revoked_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(grant.id)
        .bind(grant.resource_owner_id)
        .bind(grant.application_id)
        .bind(&grant.token)
        .bind(grant.expires_in)
        .bind(&grant.redirect_uri)
        .bind(&grant.scopes)
        .bind(grant.created_at)
        .bind(grant.revoked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Find an authorization grant by its code.
    pub async fn find_access_grant(&self, token: &str) -> Result<Option<AccessGrant>, ServiceError> {
        let grant =
            sqlx::query_as::<_, AccessGrant>("SELECT * FROM oauth_access_grants WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(grant)
    }

    /// Consume an authorization grant. Guarded the same way as token
    /// revocation; zero rows means the code was already used.
    pub async fn consume_access_grant(
        &self,
        token: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            "UPDATE oauth_access_grants SET revoked_at = ? WHERE token = ? AND revoked_at IS NULL",
        )
        .bind(revoked_at)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Map unique-constraint violations to a domain conflict, everything else
/// to a database error.
fn conflict_on_unique(message: &str) -> impl FnOnce(sqlx::Error) -> ServiceError + '_ {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ServiceError::Conflict(message.to_string())
        }
        _ => ServiceError::Database(e),
    }
}
