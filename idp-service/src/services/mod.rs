//! Services layer for the identity provider.
//!
//! Domain logic lives here: persistence, tenant resolution, identity
//! verification, WebAuthn ceremonies, OAuth2 token issuance, and the
//! authorization policy. Handlers stay thin.

mod database;
pub mod error;
mod identity;
mod oauth;
mod policy;
mod tenants;
mod webauthn;

pub use database::Database;
pub use error::ServiceError;
pub use identity::{FederatedProfile, IdentityService};
pub use oauth::{
    AuthorizeRequest, AuthorizeResponse, IntrospectionRequest, IntrospectionResponse,
    OauthService, RevocationRequest, TokenRequest,
};
pub use policy::Policy;
pub use tenants::TenantResolver;
pub use webauthn::{WebauthnEngine, INVALID_LOGIN_MESSAGE};
