//! Service implementation for the static permission plugin.

use std::collections::{BTreeSet, HashMap, HashSet};

use anyhow::{Context, bail};
use permission_sdk::{Expression, Permission, Policy, Role, User};

use crate::config::{PolicyEntry, RoleAssignment, StaticPermissionPluginConfig};

/// Roles are keyed by `(tenant, role_id)`; `None` is the global catalog.
type RoleKey = (Option<String>, String);

/// Static permission catalog.
#[derive(Debug)]
pub struct Service {
    roles: HashMap<RoleKey, Role>,
    assignments: Vec<RoleAssignment>,
    user_permissions: HashMap<String, HashSet<Permission>>,
    policies: Vec<PolicyEntry>,
}

impl Service {
    /// Build the catalog from plugin configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a role id is declared twice for the same tenant or
    /// a policy expression does not compile.
    pub fn from_config(cfg: &StaticPermissionPluginConfig) -> anyhow::Result<Self> {
        let mut roles = HashMap::with_capacity(cfg.roles.len());
        for role in &cfg.roles {
            let key = (role.tenant_id.clone(), role.role_id.clone());
            if roles.insert(key, role.clone()).is_some() {
                bail!(
                    "role '{}' is declared more than once for tenant '{}'",
                    role.role_id,
                    role.tenant_id.as_deref().unwrap_or("<global>")
                );
            }
        }

        for entry in &cfg.policies {
            Expression::parse(&entry.expression)
                .with_context(|| format!("policy '{}' has an invalid expression", entry.policy_id))?;
        }

        for assignment in &cfg.assignments {
            for role_id in &assignment.roles {
                let known = roles.keys().any(|(_, id)| id == role_id);
                if !known {
                    tracing::warn!(
                        user_id = %assignment.user_id,
                        role_id = %role_id,
                        "assignment references a role that is not in the catalog"
                    );
                }
            }
        }

        let mut user_permissions: HashMap<String, HashSet<Permission>> = HashMap::new();
        for grant in &cfg.user_permissions {
            user_permissions
                .entry(grant.user_id.clone())
                .or_default()
                .extend(grant.permissions.iter().cloned());
        }

        Ok(Self {
            roles,
            assignments: cfg.assignments.clone(),
            user_permissions,
            policies: cfg.policies.clone(),
        })
    }

    /// The role visible as `role_id` in `tenant_id`.
    ///
    /// A tenant-bound role takes precedence over a global one with the same id.
    #[must_use]
    pub fn role(&self, role_id: &str, tenant_id: Option<&str>) -> Option<&Role> {
        let tenant_bound = tenant_id.and_then(|tenant| {
            self.roles
                .get(&(Some(tenant.to_owned()), role_id.to_owned()))
        });
        tenant_bound.or_else(|| self.roles.get(&(None, role_id.to_owned())))
    }

    /// Roles assigned to `user_id` that apply in `tenant_id`.
    #[must_use]
    pub fn roles_for(&self, user_id: &str, tenant_id: Option<&str>) -> Vec<Role> {
        let role_ids: BTreeSet<&str> = self
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id && applies_in(a.tenant_id.as_deref(), tenant_id))
            .flat_map(|a| a.roles.iter().map(String::as_str))
            .collect();

        role_ids
            .into_iter()
            .filter_map(|id| self.role(id, tenant_id))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn role_permissions(&self, role_id: &str, tenant_id: Option<&str>) -> HashSet<Permission> {
        self.role(role_id, tenant_id)
            .map(|role| role.permissions.clone())
            .unwrap_or_default()
    }

    /// Permissions granted to the user directly.
    #[must_use]
    pub fn direct_permissions(&self, user: &User) -> HashSet<Permission> {
        self.user_permissions
            .get(&user.user_id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn policies_for(&self, resource: &str, action: &str, tenant_id: Option<&str>) -> Vec<Policy> {
        self.policies
            .iter()
            .filter(|p| {
                p.resource == resource
                    && p.action == action
                    && applies_in(p.tenant_id.as_deref(), tenant_id)
            })
            .map(PolicyEntry::to_policy)
            .collect()
    }
}

/// A global entry applies everywhere; a tenant-bound one only in its tenant.
fn applies_in(bound_to: Option<&str>, requested: Option<&str>) -> bool {
    bound_to.is_none_or(|tenant| requested == Some(tenant))
}
