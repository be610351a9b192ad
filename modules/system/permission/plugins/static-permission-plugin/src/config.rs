//! Configuration for the static permission plugin.

use permission_sdk::{Permission, Policy, Role};
use serde::Deserialize;

/// Plugin configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticPermissionPluginConfig {
    /// Role catalog.
    pub roles: Vec<Role>,

    /// Which users hold which roles.
    pub assignments: Vec<RoleAssignment>,

    /// Permissions granted to a user directly, outside any role.
    pub user_permissions: Vec<UserPermissions>,

    pub policies: Vec<PolicyEntry>,

    /// Lifetime of cached lookups in seconds. `0` disables the cache.
    pub cache_ttl_secs: u64,
}

/// Roles held by one user, optionally only within one tenant.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleAssignment {
    pub user_id: String,
    /// `None` applies in every tenant.
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserPermissions {
    pub user_id: String,
    pub permissions: Vec<Permission>,
}

/// An ABAC policy, optionally bound to one tenant.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyEntry {
    pub policy_id: String,
    #[serde(default)]
    pub name: String,
    pub resource: String,
    pub action: String,
    pub expression: String,
    /// `None` applies in every tenant.
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl PolicyEntry {
    #[must_use]
    pub fn to_policy(&self) -> Policy {
        Policy {
            policy_id: self.policy_id.clone(),
            name: self.name.clone(),
            resource: self.resource.clone(),
            action: self.action.clone(),
            expression: self.expression.clone(),
        }
    }
}
