//! Role-based checks against the permission catalog.

use std::collections::HashSet;
use std::sync::Arc;

use crate::api::UserPermissionProvider;
use crate::models::{Permission, PermissionLevel, User};

/// `true` when some permission in `permissions` authorizes `level` on
/// `(resource, action)`.
pub fn grants<'a>(
    permissions: impl IntoIterator<Item = &'a Permission>,
    resource: &str,
    action: &str,
    level: PermissionLevel,
) -> bool {
    permissions
        .into_iter()
        .any(|p| p.authorizes(resource, action, level))
}

/// Evaluates role-based access. Every failure path answers `false`.
#[derive(Clone)]
pub struct RbacEvaluator {
    provider: Arc<dyn UserPermissionProvider>,
}

impl RbacEvaluator {
    #[must_use]
    pub fn new(provider: Arc<dyn UserPermissionProvider>) -> Self {
        Self { provider }
    }

    /// Whether any of `session_roles` carries a permission for `level` on
    /// `(resource, action)` within `tenant_id`.
    ///
    /// A provider failure for any role denies the whole check.
    pub async fn has_permission<I, S>(
        &self,
        resource: &str,
        action: &str,
        level: PermissionLevel,
        session_roles: I,
        tenant_id: Option<&str>,
    ) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolved: HashSet<Permission> = HashSet::new();
        for role in session_roles {
            let role_id = role.as_ref();
            match self.provider.get_role_permissions(role_id, tenant_id).await {
                Ok(permissions) => resolved.extend(permissions),
                Err(e) => {
                    tracing::error!(
                        role_id,
                        resource,
                        action,
                        error = %e,
                        "failed to resolve role permissions, denying"
                    );
                    return false;
                }
            }
        }

        let granted = grants(&resolved, resource, action, level);
        tracing::debug!(resource, action, ?level, granted, "rbac decision");
        granted
    }

    /// Whether `user` holds a permission for `level` on `(resource, action)`,
    /// either directly or through any role the provider assigns to them.
    pub async fn user_has_permission(
        &self,
        user: &User,
        resource: &str,
        action: &str,
        level: PermissionLevel,
    ) -> bool {
        let direct = match self.provider.get_permissions(user).await {
            Ok(permissions) => permissions,
            Err(e) => {
                tracing::error!(
                    user_id = %user.user_id,
                    resource,
                    action,
                    error = %e,
                    "failed to resolve user permissions, denying"
                );
                return false;
            }
        };
        if grants(&direct, resource, action, level) {
            tracing::debug!(user_id = %user.user_id, resource, action, "granted by direct permission");
            return true;
        }

        let tenant_id = user.tenant_id.as_deref();
        let roles = match self.provider.get_roles(&user.user_id, tenant_id).await {
            Ok(roles) => roles,
            Err(e) => {
                tracing::error!(
                    user_id = %user.user_id,
                    error = %e,
                    "failed to resolve user roles, denying"
                );
                return false;
            }
        };

        // Roles may arrive with their permissions inlined; resolve the rest.
        if roles.iter().any(|r| r.grants(resource, action, level)) {
            tracing::debug!(user_id = %user.user_id, resource, action, "granted by assigned role");
            return true;
        }
        self.has_permission(
            resource,
            action,
            level,
            roles.iter().map(|r| r.role_id.as_str()),
            tenant_id,
        )
        .await
    }

    /// Whether `user_id` holds a role whose id or name is `role`.
    pub async fn has_role(&self, user_id: &str, tenant_id: Option<&str>, role: &str) -> bool {
        match self.provider.get_roles(user_id, tenant_id).await {
            Ok(roles) => roles.iter().any(|r| r.role_id == role || r.name == role),
            Err(e) => {
                tracing::error!(user_id, role, error = %e, "failed to resolve user roles, denying");
                false
            }
        }
    }
}

impl std::fmt::Debug for RbacEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RbacEvaluator").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tracing_test::traced_test;

    use super::*;
    use crate::error::ProviderError;
    use crate::models::{Policy, Role};

    #[derive(Default)]
    struct Catalog {
        role_permissions: HashMap<String, HashSet<Permission>>,
        user_permissions: HashMap<String, HashSet<Permission>>,
        user_roles: HashMap<String, Vec<Role>>,
        broken_role: Option<String>,
    }

    #[async_trait]
    impl UserPermissionProvider for Catalog {
        async fn get_permissions(
            &self,
            user: &User,
        ) -> Result<HashSet<Permission>, ProviderError> {
            Ok(self
                .user_permissions
                .get(&user.user_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_roles(
            &self,
            user_id: &str,
            _tenant_id: Option<&str>,
        ) -> Result<Vec<Role>, ProviderError> {
            Ok(self.user_roles.get(user_id).cloned().unwrap_or_default())
        }

        async fn get_role_permissions(
            &self,
            role_id: &str,
            _tenant_id: Option<&str>,
        ) -> Result<HashSet<Permission>, ProviderError> {
            if self.broken_role.as_deref() == Some(role_id) {
                return Err(ProviderError::Unavailable("connection refused".to_owned()));
            }
            Ok(self
                .role_permissions
                .get(role_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_policies(
            &self,
            _resource: &str,
            _action: &str,
            _tenant_id: Option<&str>,
        ) -> Result<Vec<Policy>, ProviderError> {
            Ok(Vec::new())
        }
    }

    fn perm(id: &str, resource: &str, action: &str, level: PermissionLevel) -> Permission {
        Permission::new(id, resource, action, level)
    }

    fn evaluator(catalog: Catalog) -> RbacEvaluator {
        RbacEvaluator::new(Arc::new(catalog))
    }

    fn editor_catalog() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.role_permissions.insert(
            "editor".to_owned(),
            HashSet::from([perm("p1", "orders", "update", PermissionLevel::Write)]),
        );
        catalog
    }

    #[tokio::test]
    async fn level_at_or_below_grant_is_allowed() {
        let rbac = evaluator(editor_catalog());

        for (level, expected) in [
            (PermissionLevel::Read, true),
            (PermissionLevel::Write, true),
            (PermissionLevel::Delete, false),
            (PermissionLevel::Admin, false),
        ] {
            assert_eq!(
                rbac.has_permission("orders", "update", level, ["editor"], Some("t1"))
                    .await,
                expected,
                "{level:?}"
            );
        }
    }

    #[tokio::test]
    async fn resource_and_action_must_match_exactly() {
        let rbac = evaluator(editor_catalog());
        let roles = ["editor"];

        assert!(
            !rbac
                .has_permission("orders", "delete", PermissionLevel::Read, roles, None)
                .await
        );
        assert!(
            !rbac
                .has_permission("order", "update", PermissionLevel::Read, roles, None)
                .await
        );
        assert!(
            !rbac
                .has_permission("users", "update", PermissionLevel::Read, roles, None)
                .await
        );
    }

    #[tokio::test]
    async fn no_roles_means_no_permission() {
        let rbac = evaluator(editor_catalog());
        let roles: [&str; 0] = [];
        assert!(
            !rbac
                .has_permission("orders", "update", PermissionLevel::Read, roles, None)
                .await
        );
    }

    #[tokio::test]
    async fn union_over_roles() {
        let mut catalog = editor_catalog();
        catalog.role_permissions.insert(
            "auditor".to_owned(),
            HashSet::from([perm("p2", "reports", "read", PermissionLevel::Read)]),
        );
        let rbac = evaluator(catalog);

        let roles = ["editor", "auditor", "unknown"];
        assert!(
            rbac.has_permission("reports", "read", PermissionLevel::Read, roles, None)
                .await
        );
        assert!(
            rbac.has_permission("orders", "update", PermissionLevel::Write, roles, None)
                .await
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn provider_failure_fails_closed() {
        let mut catalog = editor_catalog();
        catalog.broken_role = Some("broken".to_owned());
        let rbac = evaluator(catalog);

        assert!(
            !rbac
                .has_permission(
                    "orders",
                    "update",
                    PermissionLevel::Read,
                    ["editor", "broken"],
                    None
                )
                .await
        );
        assert!(logs_contain("failed to resolve role permissions, denying"));
    }

    #[tokio::test]
    async fn user_direct_and_role_permissions() {
        let mut catalog = editor_catalog();
        catalog.user_permissions.insert(
            "alice".to_owned(),
            HashSet::from([perm("p9", "invoices", "read", PermissionLevel::Read)]),
        );
        catalog
            .user_roles
            .insert("alice".to_owned(), vec![Role::new("editor", "Editor")]);
        let rbac = evaluator(catalog);
        let alice = User::new("alice");

        assert!(
            rbac.user_has_permission(&alice, "invoices", "read", PermissionLevel::Read)
                .await
        );
        assert!(
            rbac.user_has_permission(&alice, "orders", "update", PermissionLevel::Write)
                .await
        );
        assert!(
            !rbac
                .user_has_permission(&alice, "orders", "update", PermissionLevel::Admin)
                .await
        );
        assert!(
            !rbac
                .user_has_permission(&User::new("bob"), "invoices", "read", PermissionLevel::Read)
                .await
        );
    }

    #[tokio::test]
    async fn has_role_matches_id_or_name() {
        let mut catalog = Catalog::default();
        catalog
            .user_roles
            .insert("alice".to_owned(), vec![Role::new("r-1", "editor")]);
        let rbac = evaluator(catalog);

        assert!(rbac.has_role("alice", None, "editor").await);
        assert!(rbac.has_role("alice", None, "r-1").await);
        assert!(!rbac.has_role("alice", None, "admin").await);
        assert!(!rbac.has_role("bob", None, "editor").await);
    }

    #[test]
    fn grants_is_pure_over_the_given_set() {
        let set = [
            perm("a", "orders", "read", PermissionLevel::Read),
            perm("b", "orders", "delete", PermissionLevel::Delete),
        ];
        assert!(grants(&set, "orders", "delete", PermissionLevel::Write));
        assert!(!grants(&set, "orders", "read", PermissionLevel::Write));
        assert!(!grants(&[] as &[Permission], "orders", "read", PermissionLevel::Read));
    }
}
