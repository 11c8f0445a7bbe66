//! OAuth2 token service: grants, revocation, introspection, and bearer
//! validation, with opaque tokens persisted in SQLite.
//!
//! Error precedence at the token endpoint is deterministic: missing
//! grant_type first, unknown grant types next; the password grant checks
//! username/password presence before client authentication, while code
//! redemption authenticates the client before touching the code.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::OauthConfig;
use crate::models::{AccessGrant, AccessToken, OauthApplication, Tenant, TokenResponse, User};
use crate::services::{Database, IdentityService, ServiceError};
use crate::utils::{generate_token, secure_compare};

const INVALID_REQUEST_MESSAGE: &str = "The request is missing a required parameter, includes an unsupported parameter value, or is otherwise malformed.";
const INVALID_CLIENT_MESSAGE: &str = "Client authentication failed due to unknown client, no client authentication included, or unsupported authentication method.";
const INVALID_GRANT_MESSAGE: &str = "The provided authorization grant is invalid, expired, revoked, does not match the redirection URI used in the authorization request, or was issued to another client.";

/// Form parameters accepted by `POST /oauth/token`. Everything is optional
/// so the service can produce the standard error codes instead of a
/// deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
}

/// Form parameters for `POST /oauth/revoke`.
#[derive(Debug, Default, Deserialize)]
pub struct RevocationRequest {
    pub token: Option<String>,
}

/// Form parameters for `POST /oauth/introspect`.
#[derive(Debug, Default, Deserialize)]
pub struct IntrospectionRequest {
    pub token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Form parameters for `POST /oauth/authorize`.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeRequest {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
}

/// RFC 7662 introspection response. Inactive tokens reveal nothing but
/// `active: false`.
#[derive(Debug, Serialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl IntrospectionResponse {
    fn inactive() -> Self {
        Self {
            active: false,
            scope: None,
            client_id: None,
            token_type: None,
            exp: None,
            iat: None,
        }
    }
}

/// Response of the auto-approving authorization endpoint.
#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub status: String,
    pub redirect_uri: String,
}

#[derive(Debug, Serialize)]
struct IdTokenClaims {
    iss: String,
    sub: String,
    aud: String,
    exp: i64,
    iat: i64,
}

#[derive(Clone)]
pub struct OauthService {
    db: Database,
    identity: IdentityService,
    access_token_ttl_seconds: i64,
    grant_ttl_seconds: i64,
    default_scope: String,
    oidc_issuer: String,
    oidc_signing_key: String,
}

impl OauthService {
    pub fn new(db: Database, identity: IdentityService, config: &OauthConfig) -> Self {
        Self {
            db,
            identity,
            access_token_ttl_seconds: config.access_token_ttl_seconds,
            grant_ttl_seconds: config.grant_ttl_seconds,
            default_scope: config.default_scope.clone(),
            oidc_issuer: config.oidc_issuer.clone(),
            oidc_signing_key: config.oidc_signing_key.clone(),
        }
    }

    // ==================== Token endpoint ====================

    pub async fn token(
        &self,
        tenant: &Tenant,
        req: TokenRequest,
    ) -> Result<TokenResponse, ServiceError> {
        let grant_type = req
            .grant_type
            .as_deref()
            .filter(|g| !g.is_empty())
            .ok_or_else(|| ServiceError::InvalidRequest(INVALID_REQUEST_MESSAGE.to_string()))?;

        match grant_type {
            "password" => self.password_grant(tenant, &req).await,
            "authorization_code" => self.authorization_code_grant(&req).await,
            "client_credentials" => self.client_credentials_grant(&req).await,
            other => Err(ServiceError::UnsupportedGrantType(other.to_string())),
        }
    }

    async fn password_grant(
        &self,
        tenant: &Tenant,
        req: &TokenRequest,
    ) -> Result<TokenResponse, ServiceError> {
        let username = req
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ServiceError::InvalidGrant(INVALID_GRANT_MESSAGE.to_string()))?;
        let password = req
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ServiceError::InvalidGrant(INVALID_GRANT_MESSAGE.to_string()))?;

        let app = self
            .authenticate_client(req.client_id.as_deref(), req.client_secret.as_deref())
            .await?;

        let owner = self
            .identity
            .authenticate_password(tenant, username, password)
            .await
            .map_err(|e| match e {
                ServiceError::InvalidCredentials => {
                    ServiceError::InvalidGrant(INVALID_GRANT_MESSAGE.to_string())
                }
                other => other,
            })?;

        let scope = self.normalize_scope(req.scope.as_deref());
        self.issue_token(&app, Some(&owner), scope).await
    }

    async fn authorization_code_grant(
        &self,
        req: &TokenRequest,
    ) -> Result<TokenResponse, ServiceError> {
        let app = self
            .authenticate_client(req.client_id.as_deref(), req.client_secret.as_deref())
            .await?;

        let code = req
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServiceError::InvalidGrant(INVALID_GRANT_MESSAGE.to_string()))?;

        let grant = self
            .db
            .find_access_grant(code)
            .await?
            .ok_or_else(|| ServiceError::InvalidGrant(INVALID_GRANT_MESSAGE.to_string()))?;

        let redirect_uri = req.redirect_uri.as_deref().unwrap_or_default();
        if grant.application_id != app.id
            || grant.redirect_uri != redirect_uri
            || !grant.is_valid(Utc::now())
        {
            return Err(ServiceError::InvalidGrant(INVALID_GRANT_MESSAGE.to_string()));
        }

        // Single-use: the guarded UPDATE wins exactly one race.
        let consumed = self.db.consume_access_grant(&grant.token, Utc::now()).await?;
        if consumed == 0 {
            return Err(ServiceError::InvalidGrant(INVALID_GRANT_MESSAGE.to_string()));
        }

        let owner = self
            .db
            .find_user_by_id(grant.resource_owner_id)
            .await?
            .ok_or_else(|| ServiceError::InvalidGrant(INVALID_GRANT_MESSAGE.to_string()))?;

        self.issue_token(&app, Some(&owner), grant.scopes.clone()).await
    }

    async fn client_credentials_grant(
        &self,
        req: &TokenRequest,
    ) -> Result<TokenResponse, ServiceError> {
        let app = self
            .authenticate_client(req.client_id.as_deref(), req.client_secret.as_deref())
            .await?;

        let scope = self.normalize_scope(req.scope.as_deref());
        self.issue_token(&app, None, scope).await
    }

    // ==================== Revocation & introspection ====================

    /// RFC 7009: revocation is idempotent and succeeds even when the token
    /// is unknown or the parameter is missing. The first revocation time is
    /// preserved by the guarded UPDATE.
    pub async fn revoke(&self, req: RevocationRequest) -> Result<(), ServiceError> {
        if let Some(token) = req.token.as_deref().filter(|t| !t.is_empty()) {
            let revoked = self.db.revoke_access_token(token, Utc::now()).await?;
            if revoked > 0 {
                tracing::info!("Access token revoked");
            }
        }
        Ok(())
    }

    /// RFC 7662: introspection requires client authentication; everything
    /// short of a valid token answers `active: false`.
    pub async fn introspect(
        &self,
        req: IntrospectionRequest,
    ) -> Result<IntrospectionResponse, ServiceError> {
        self.authenticate_client(req.client_id.as_deref(), req.client_secret.as_deref())
            .await?;

        let token = match req.token.as_deref().filter(|t| !t.is_empty()) {
            Some(t) => t,
            None => return Ok(IntrospectionResponse::inactive()),
        };

        let access = match self.db.find_access_token(token).await? {
            Some(t) if t.is_valid(Utc::now()) => t,
            _ => return Ok(IntrospectionResponse::inactive()),
        };

        let app = self.db.find_application_by_id(access.application_id).await?;

        Ok(IntrospectionResponse {
            active: true,
            scope: Some(access.scopes.clone()),
            client_id: app.map(|a| a.uid),
            token_type: Some("Bearer".to_string()),
            exp: Some(access.expires_at().timestamp()),
            iat: Some(access.created_at.timestamp()),
        })
    }

    // ==================== Authorization endpoint ====================

    /// Auto-approving authorization: the signed-in session user consents
    /// implicitly and receives a single-use code on the registered
    /// redirect URI.
    pub async fn authorize(
        &self,
        user: &User,
        req: AuthorizeRequest,
    ) -> Result<AuthorizeResponse, ServiceError> {
        if req.response_type.as_deref() != Some("code") {
            return Err(ServiceError::InvalidRequest(INVALID_REQUEST_MESSAGE.to_string()));
        }

        let client_id = req
            .client_id
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServiceError::InvalidClient(INVALID_CLIENT_MESSAGE.to_string()))?;
        let app = self
            .db
            .find_application_by_uid(client_id)
            .await?
            .ok_or_else(|| ServiceError::InvalidClient(INVALID_CLIENT_MESSAGE.to_string()))?;

        let redirect_uri = match req.redirect_uri.as_deref().filter(|r| !r.is_empty()) {
            Some(r) if r == app.redirect_uri => r.to_string(),
            Some(_) => {
                return Err(ServiceError::InvalidGrant(INVALID_GRANT_MESSAGE.to_string()))
            }
            None => app.redirect_uri.clone(),
        };

        let grant = AccessGrant {
            id: Uuid::new_v4(),
            resource_owner_id: user.id,
            application_id: app.id,
            token: generate_token(),
            expires_in: self.grant_ttl_seconds,
            redirect_uri: redirect_uri.clone(),
            scopes: self.normalize_scope(req.scope.as_deref()),
            created_at: Utc::now(),
            revoked_at: None,
        };
        self.db.insert_access_grant(&grant).await?;

        let mut location = format!(
            "{}?code={}",
            redirect_uri,
            urlencoding::encode(&grant.token)
        );
        if let Some(state) = req.state.as_deref().filter(|s| !s.is_empty()) {
            location.push_str(&format!("&state={}", urlencoding::encode(state)));
        }

        tracing::info!(user_id = %user.id, client_id = %app.uid, "Authorization code issued");
        Ok(AuthorizeResponse {
            status: "redirect".to_string(),
            redirect_uri: location,
        })
    }

    // ==================== Bearer validation ====================

    /// Resolve a bearer token to its resource owner within the current
    /// tenant. Every failure mode is the same `Unauthenticated` error.
    pub async fn validate_bearer(
        &self,
        tenant: &Tenant,
        token: &str,
    ) -> Result<User, ServiceError> {
        let access = self
            .db
            .find_access_token(token)
            .await?
            .filter(|t| t.is_valid(Utc::now()))
            .ok_or(ServiceError::Unauthenticated)?;

        let owner_id = access
            .resource_owner_id
            .ok_or(ServiceError::Unauthenticated)?;

        let user = self
            .db
            .find_user_by_id(owner_id)
            .await?
            .ok_or(ServiceError::Unauthenticated)?;

        if user.tenant_id != tenant.id {
            return Err(ServiceError::Unauthenticated);
        }

        Ok(user)
    }

    // ==================== Internals ====================

    async fn authenticate_client(
        &self,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> Result<OauthApplication, ServiceError> {
        let client_id = client_id
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServiceError::InvalidClient(INVALID_CLIENT_MESSAGE.to_string()))?;

        let app = self
            .db
            .find_application_by_uid(client_id)
            .await?
            .ok_or_else(|| ServiceError::InvalidClient(INVALID_CLIENT_MESSAGE.to_string()))?;

        let secret = client_secret.unwrap_or_default();
        if app.confidential || !secret.is_empty() {
            if !secure_compare(&app.secret, secret) {
                return Err(ServiceError::InvalidClient(INVALID_CLIENT_MESSAGE.to_string()));
            }
        }

        Ok(app)
    }

    async fn issue_token(
        &self,
        app: &OauthApplication,
        owner: Option<&User>,
        scope: String,
    ) -> Result<TokenResponse, ServiceError> {
        let token = AccessToken {
            id: Uuid::new_v4(),
            resource_owner_id: owner.map(|u| u.id),
            application_id: app.id,
            token: generate_token(),
            scopes: scope.clone(),
            expires_in: self.access_token_ttl_seconds,
            created_at: Utc::now(),
            revoked_at: None,
        };
        self.db.insert_access_token(&token).await?;

        let id_token = self.maybe_id_token(app, owner, &scope)?;

        tracing::info!(
            client_id = %app.uid,
            resource_owner = ?token.resource_owner_id,
            scope = %scope,
            "Access token issued"
        );

        Ok(TokenResponse {
            access_token: token.token,
            token_type: "Bearer".to_string(),
            expires_in: token.expires_in,
            scope,
            created_at: token.created_at.timestamp(),
            id_token,
        })
    }

    /// HS256 id_token when the grant carries the `openid` scope and a
    /// resource owner exists.
    fn maybe_id_token(
        &self,
        app: &OauthApplication,
        owner: Option<&User>,
        scope: &str,
    ) -> Result<Option<String>, ServiceError> {
        let owner = match owner {
            Some(o) if scope.split_whitespace().any(|s| s == "openid") => o,
            _ => return Ok(None),
        };

        let now = Utc::now();
        let claims = IdTokenClaims {
            iss: self.oidc_issuer.clone(),
            sub: owner.id.to_string(),
            aud: app.uid.clone(),
            exp: (now + Duration::seconds(self.access_token_ttl_seconds)).timestamp(),
            iat: now.timestamp(),
        };

        let jwt = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.oidc_signing_key.as_bytes()),
        )
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("id_token signing: {}", e)))?;

        Ok(Some(jwt))
    }

    fn normalize_scope(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s.to_string(),
            None => self.default_scope.clone(),
        }
    }
}
