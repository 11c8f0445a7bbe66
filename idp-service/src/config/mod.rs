use idp_core::config as core_config;
use idp_core::error::AppError;
use serde::Deserialize;
use std::env;

use crate::models::{TenantMode, TenantType};

/// Configuration for the identity provider, loaded from the environment.
///
/// In dev every value has a default; in prod unset values fail fast at boot.
#[derive(Debug, Clone, Deserialize)]
pub struct IdpConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub tenancy: TenancyConfig,
    pub relying_party: RelyingPartyConfig,
    pub facebook: FacebookConfig,
    pub oauth: OauthConfig,
    pub session: SessionConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// How the active tenant is derived per request. `tenant_name` names the
/// one tenant served in single mode and is ignored in multi mode.
#[derive(Debug, Clone, Deserialize)]
pub struct TenancyConfig {
    pub mode: TenantMode,
    pub tenant_name: Option<String>,
    pub resolution: TenantType,
}

/// WebAuthn relying-party identity. `rp_id` must be a registrable suffix of
/// the origin's domain or browsers reject every ceremony.
#[derive(Debug, Clone, Deserialize)]
pub struct RelyingPartyConfig {
    pub rp_id: String,
    pub rp_origin: String,
    pub rp_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FacebookConfig {
    pub app_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OauthConfig {
    pub access_token_ttl_seconds: i64,
    pub grant_ttl_seconds: i64,
    pub default_scope: String,
    pub oidc_issuer: String,
    pub oidc_signing_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub inactivity_minutes: i64,
    pub challenge_ttl_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

const DEV_OIDC_SIGNING_KEY: &str = "test_secret_key_for_openid_connect";

impl IdpConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = IdpConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("idp-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", Some("sqlite:idp.db?mode=rwc"), is_prod)?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("5"), is_prod)?
                    .parse()
                    .unwrap_or(5),
            },
            tenancy: TenancyConfig {
                mode: get_env("TENANT_MODE", Some("single"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                tenant_name: env::var("TENANT_NAME").ok().or_else(|| {
                    if is_prod {
                        None
                    } else {
                        Some("demo".to_string())
                    }
                }),
                resolution: get_env("TENANT_RESOLUTION", Some("subdomain"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            relying_party: RelyingPartyConfig {
                rp_id: get_env("WEBAUTHN_RP_ID", Some("localhost"), is_prod)?,
                rp_origin: get_env("WEBAUTHN_RP_ORIGIN", Some("http://localhost:8080"), is_prod)?,
                rp_name: get_env("WEBAUTHN_RP_NAME", Some("Identity Provider"), is_prod)?,
            },
            facebook: FacebookConfig {
                app_secret: get_env("FACEBOOK_APP_SECRET", Some("facebook_dev_secret"), is_prod)?,
            },
            oauth: OauthConfig {
                access_token_ttl_seconds: get_env(
                    "OAUTH_ACCESS_TOKEN_TTL_SECONDS",
                    Some("7200"),
                    is_prod,
                )?
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                })?,
                grant_ttl_seconds: get_env("OAUTH_GRANT_TTL_SECONDS", Some("600"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                    })?,
                default_scope: get_env("OAUTH_DEFAULT_SCOPE", Some("read"), is_prod)?,
                oidc_issuer: get_env("OIDC_ISSUER", Some("http://localhost:8080"), is_prod)?,
                oidc_signing_key: get_env("OIDC_SIGNING_KEY", Some(DEV_OIDC_SIGNING_KEY), is_prod)?,
            },
            session: SessionConfig {
                inactivity_minutes: get_env("SESSION_INACTIVITY_MINUTES", Some("1440"), is_prod)?
                    .parse()
                    .unwrap_or(1440),
                challenge_ttl_seconds: get_env(
                    "WEBAUTHN_CHALLENGE_TTL_SECONDS",
                    Some("120"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(120),
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.oauth.access_token_ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "OAUTH_ACCESS_TOKEN_TTL_SECONDS must be positive"
            )));
        }

        if self.oauth.grant_ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "OAUTH_GRANT_TTL_SECONDS must be positive"
            )));
        }

        if self.session.challenge_ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "WEBAUTHN_CHALLENGE_TTL_SECONDS must be positive"
            )));
        }

        if self.tenancy.mode == TenantMode::Single
            && self.tenancy.tenant_name.as_deref().unwrap_or("").is_empty()
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TENANT_NAME is required when TENANT_MODE is 'single'"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.oauth.oidc_signing_key == DEV_OIDC_SIGNING_KEY {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "OIDC_SIGNING_KEY must not use the dev default in production"
                )));
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
