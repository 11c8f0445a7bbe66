//! Identity resolution: password verification and federated-identity
//! linking.

use validator::ValidateEmail;

use crate::models::{Tenant, User};
use crate::services::{Database, ServiceError};
use crate::utils::{generated_password, hash_password, verify_password, Password, PasswordHashString};

/// Profile asserted by an external identity provider.
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    pub provider: String,
    pub uid: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Clone)]
pub struct IdentityService {
    db: Database,
}

impl IdentityService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Verify email + password within a tenant.
    ///
    /// Lookup misses and hash mismatches produce the same error so the
    /// response never reveals whether the email exists.
    pub async fn authenticate_password(
        &self,
        tenant: &Tenant,
        email: &str,
        password: &str,
    ) -> Result<User, ServiceError> {
        let user = self
            .db
            .find_user_by_email_in_tenant(tenant.id, email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        verify_password(
            &Password::new(password.to_string()),
            &PasswordHashString::new(user.encrypted_password.clone()),
        )
        .map_err(|_| ServiceError::InvalidCredentials)?;

        Ok(user)
    }

    /// Resolve a federated login to a local account.
    ///
    /// Order matters: an account already locked to the (provider, uid) pair
    /// wins; otherwise an existing account with the asserted email inside
    /// the current tenant gets the identity linked onto it; otherwise a new
    /// account is provisioned with a random password.
    pub async fn from_omniauth(
        &self,
        profile: FederatedProfile,
        tenant: &Tenant,
    ) -> Result<User, ServiceError> {
        if let Some(user) = self
            .db
            .find_user_by_provider_uid(&profile.provider, &profile.uid)
            .await?
        {
            return Ok(user);
        }

        if !profile.email.validate_email() {
            return Err(ServiceError::Validation(
                "Federated profile email is invalid".to_string(),
            ));
        }

        if let Some(user) = self
            .db
            .find_user_by_email_in_tenant(tenant.id, &profile.email)
            .await?
        {
            self.db
                .update_user_federated_identity(
                    user.id,
                    &profile.provider,
                    &profile.uid,
                    profile.name.as_deref(),
                    profile.image.as_deref(),
                )
                .await?;

            tracing::info!(user_id = %user.id, provider = %profile.provider, "Linked federated identity to existing account");

            let linked = self
                .db
                .find_user_by_id(user.id)
                .await?
                .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
            return Ok(linked);
        }

        let password_hash = hash_password(&generated_password())
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e)))?;

        let mut user = User::new(tenant.id, profile.email, password_hash.into_string());
        user.provider = Some(profile.provider.clone());
        user.uid = Some(profile.uid);
        user.name = profile.name;
        user.image = profile.image;

        self.db.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, provider = %profile.provider, "Provisioned account from federated identity");

        Ok(user)
    }

    /// Create a password-credentialed user within a tenant.
    pub async fn create_user(
        &self,
        tenant: &Tenant,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<User, ServiceError> {
        if !email.validate_email() {
            return Err(ServiceError::Validation("Email is invalid".to_string()));
        }

        if password.len() < 6 {
            return Err(ServiceError::Validation(
                "Password is too short (minimum is 6 characters)".to_string(),
            ));
        }

        let password_hash = hash_password(&Password::new(password.to_string()))
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e)))?;

        let mut user = User::new(tenant.id, email.to_string(), password_hash.into_string());
        user.name = name;

        self.db.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, tenant_id = %tenant.id, "User created");

        Ok(user)
    }

    /// Delete a user and everything it owns.
    pub async fn delete_user(&self, user_id: uuid::Uuid) -> Result<(), ServiceError> {
        self.db.delete_user_cascade(user_id).await?;
        tracing::info!(user_id = %user_id, "User deleted with owned credentials and tokens");
        Ok(())
    }
}
