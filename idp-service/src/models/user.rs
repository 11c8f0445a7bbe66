//! User model - tenant-scoped accounts with optional federated identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User entity. `encrypted_password` holds the argon2 PHC string; the
/// optional (provider, uid) pair locks the account to a federated identity.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub encrypted_password: String,
    pub provider: Option<String>,
    pub uid: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new password-credentialed user.
    pub fn new(tenant_id: Uuid, email: String, encrypted_password: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            email,
            encrypted_password,
            provider: None,
            uid: None,
            name: None,
            image: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Display name falls back to the email, mirroring what the passkey
    /// creation options expect.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }

    /// Convert to a response without credential material.
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// User response for API consumers. Never carries the password hash.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub provider: Option<String>,
    pub uid: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            tenant_id: u.tenant_id,
            email: u.email,
            provider: u.provider,
            uid: u.uid,
            name: u.name,
            image: u.image,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_email() {
        let mut user = User::new(Uuid::new_v4(), "a@example.com".to_string(), "x".to_string());
        assert_eq!(user.display_name(), "a@example.com");
        user.name = Some("Alice".to_string());
        assert_eq!(user.display_name(), "Alice");
    }

    #[test]
    fn sanitized_response_omits_password_material() {
        let user = User::new(Uuid::new_v4(), "a@example.com".to_string(), "hash".to_string());
        let json = serde_json::to_value(user.sanitized()).unwrap();
        assert!(json.get("encrypted_password").is_none());
        assert_eq!(json["email"], "a@example.com");
    }
}
