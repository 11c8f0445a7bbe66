//! Tenant model - root of the multi-tenancy hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How many tenants the deployment serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantMode {
    Single,
    Multi,
}

impl TenantMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantMode::Single => "single",
            TenantMode::Multi => "multi",
        }
    }
}

impl std::str::FromStr for TenantMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(TenantMode::Single),
            "multi" => Ok(TenantMode::Multi),
            _ => Err(format!("Invalid tenant mode: {}", s)),
        }
    }
}

/// How the active tenant is derived from a request.
///
/// `Path` is recognized so stored rows parse, but resolution rejects it
/// explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    Subdomain,
    Path,
}

impl TenantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantType::Subdomain => "subdomain",
            TenantType::Path => "path",
        }
    }
}

impl std::str::FromStr for TenantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "subdomain" => Ok(TenantType::Subdomain),
            "path" => Ok(TenantType::Path),
            _ => Err(format!("Invalid tenant type: {}", s)),
        }
    }
}

/// Tenant entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub web: Option<String>,
    pub tenant_mode: String,
    pub tenant_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Create a new tenant in the given mode, resolved by subdomain.
    pub fn new(name: String, mode: TenantMode) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            address: None,
            web: None,
            tenant_mode: mode.as_str().to_string(),
            tenant_type: TenantType::Subdomain.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mode(&self) -> Result<TenantMode, String> {
        self.tenant_mode.parse()
    }

    pub fn resolution_type(&self) -> Result<TenantType, String> {
        self.tenant_type.parse()
    }
}

/// Tenant response for API consumers.
#[derive(Debug, Serialize)]
pub struct TenantResponse {
    pub id: Uuid,
    pub name: String,
    pub tenant_mode: String,
    pub tenant_type: String,
    pub created_at: DateTime<Utc>,
}

impl From<Tenant> for TenantResponse {
    fn from(t: Tenant) -> Self {
        Self {
            id: t.id,
            name: t.name,
            tenant_mode: t.tenant_mode,
            tenant_type: t.tenant_type,
            created_at: t.created_at,
        }
    }
}
