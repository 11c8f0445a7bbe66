//! Tenant resolution: which tenant owns the current request.
//!
//! Single-tenant deployments pin one configured tenant and cache the row
//! after the first lookup. Multi-tenant deployments derive the tenant from
//! the leftmost DNS label of the Host header. Path-based resolution is a
//! recognized configuration that deliberately fails every request until a
//! routing scheme for it exists.

use tokio::sync::OnceCell;

use crate::config::TenancyConfig;
use crate::models::{Tenant, TenantMode, TenantType};
use crate::services::database::Database;
use crate::services::error::ServiceError;

pub struct TenantResolver {
    strategy: ResolutionStrategy,
    db: Database,
    cached_single: OnceCell<Tenant>,
}

#[derive(Debug)]
enum ResolutionStrategy {
    Single { tenant_name: String },
    Subdomain,
    Path,
}

impl TenantResolver {
    pub fn from_config(tenancy: &TenancyConfig, db: Database) -> Self {
        let strategy = match tenancy.mode {
            TenantMode::Single => ResolutionStrategy::Single {
                // validate() guarantees the name is present in single mode
                tenant_name: tenancy.tenant_name.clone().unwrap_or_default(),
            },
            TenantMode::Multi => match tenancy.resolution {
                TenantType::Subdomain => ResolutionStrategy::Subdomain,
                TenantType::Path => ResolutionStrategy::Path,
            },
        };

        Self {
            strategy,
            db,
            cached_single: OnceCell::new(),
        }
    }

    /// Resolve the tenant for a request from its Host header value.
    pub async fn resolve(&self, host: &str) -> Result<Tenant, ServiceError> {
        match &self.strategy {
            ResolutionStrategy::Single { tenant_name } => {
                let tenant = self
                    .cached_single
                    .get_or_try_init(|| async {
                        self.db.find_tenant_by_name(tenant_name).await?.ok_or_else(|| {
                            ServiceError::InvalidTenant(format!(
                                "Configured tenant '{}' does not exist",
                                tenant_name
                            ))
                        })
                    })
                    .await?;
                Ok(tenant.clone())
            }
            ResolutionStrategy::Subdomain => {
                let label = subdomain_label(host).ok_or_else(|| {
                    ServiceError::InvalidTenant(format!(
                        "No tenant subdomain in host '{}'",
                        host
                    ))
                })?;

                self.db.find_tenant_by_name(&label).await?.ok_or_else(|| {
                    ServiceError::NotFound(format!("No tenant registered for '{}'", label))
                })
            }
            ResolutionStrategy::Path => Err(ServiceError::InvalidTenant(
                "Path-based tenant resolution is not supported".to_string(),
            )),
        }
    }
}

/// Leftmost DNS label of a host, lowercased, with any port stripped.
///
/// Returns None when the host has fewer than three labels (no subdomain),
/// is an IP literal, or starts with an empty label.
fn subdomain_label(host: &str) -> Option<String> {
    if host.is_empty() || host.starts_with('[') {
        return None;
    }

    let without_port = host.split(':').next().unwrap_or(host);
    if without_port
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.')
    {
        return None;
    }

    let labels: Vec<&str> = without_port.split('.').collect();
    if labels.len() < 3 {
        return None;
    }

    let first = labels[0];
    if first.is_empty() {
        return None;
    }

    Some(first.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_leftmost_label() {
        assert_eq!(
            subdomain_label("acme.idp.example.com"),
            Some("acme".to_string())
        );
        assert_eq!(subdomain_label("acme.example.com"), Some("acme".to_string()));
    }

    #[test]
    fn strips_port_and_lowercases() {
        assert_eq!(
            subdomain_label("ACME.example.com:8080"),
            Some("acme".to_string())
        );
    }

    #[test]
    fn apex_and_short_hosts_have_no_subdomain() {
        assert_eq!(subdomain_label("example.com"), None);
        assert_eq!(subdomain_label("localhost"), None);
        assert_eq!(subdomain_label("localhost:8080"), None);
    }

    #[test]
    fn ip_literals_have_no_subdomain() {
        assert_eq!(subdomain_label("127.0.0.1"), None);
        assert_eq!(subdomain_label("127.0.0.1:8080"), None);
        assert_eq!(subdomain_label("[::1]:8080"), None);
    }

    #[test]
    fn empty_leading_label_is_rejected() {
        assert_eq!(subdomain_label(".example.com"), None);
        assert_eq!(subdomain_label(""), None);
    }
}
