//! Coarse authorization policy, checked at the point of object access.
//!
//! A user may read their own record and their own tenant. Nothing grants
//! listing or managing other tenants' data.

use uuid::Uuid;

use crate::models::User;
use crate::services::ServiceError;

pub struct Policy;

impl Policy {
    /// A user may read only their own user record.
    pub fn can_read_user(current: &User, target_user_id: Uuid) -> Result<(), ServiceError> {
        if current.id == target_user_id {
            Ok(())
        } else {
            Err(ServiceError::Forbidden)
        }
    }

    /// A user may read only the tenant they belong to.
    pub fn can_read_tenant(current: &User, tenant_id: Uuid) -> Result<(), ServiceError> {
        if current.tenant_id == tenant_id {
            Ok(())
        } else {
            Err(ServiceError::Forbidden)
        }
    }
}
