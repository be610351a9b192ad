//! Provider implementation for the static permission plugin.
//!
//! Implements `UserPermissionProvider` using the domain service.

use std::collections::HashSet;

use async_trait::async_trait;
use permission_sdk::{Permission, Policy, ProviderError, Role, User, UserPermissionProvider};

use super::service::Service;

#[async_trait]
impl UserPermissionProvider for Service {
    async fn get_permissions(&self, user: &User) -> Result<HashSet<Permission>, ProviderError> {
        Ok(self.direct_permissions(user))
    }

    async fn get_roles(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<Role>, ProviderError> {
        Ok(self.roles_for(user_id, tenant_id))
    }

    async fn get_role_permissions(
        &self,
        role_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<HashSet<Permission>, ProviderError> {
        Ok(self.role_permissions(role_id, tenant_id))
    }

    async fn get_policies(
        &self,
        resource: &str,
        action: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<Policy>, ProviderError> {
        Ok(self.policies_for(resource, action, tenant_id))
    }
}
