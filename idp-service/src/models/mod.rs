pub mod oauth;
pub mod tenant;
pub mod user;
pub mod webauthn_credential;

pub use oauth::{AccessGrant, AccessToken, OauthApplication, TokenResponse};
pub use tenant::{Tenant, TenantMode, TenantResponse, TenantType};
pub use user::{User, UserResponse};
pub use webauthn_credential::{CredentialResponse, WebauthnCredential};
