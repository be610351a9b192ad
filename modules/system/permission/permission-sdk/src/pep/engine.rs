//! Policy Enforcement Point object.
//!
//! [`PermissionEngine`] encapsulates the full guard flow for one protected
//! operation: read the request's session → RBAC → ABAC policies as the
//! fallback → resolve the data scope → narrow it to the session tenant.
//!
//! Constructed once during service initialisation and shared (`Arc`) by all
//! request handlers.

use std::sync::Arc;

use permkit_security::{AccessScope, ScopeFilter, SessionContext, SessionInfo};

use super::operation::ProtectedOperation;
use crate::abac::AbacEvaluator;
use crate::api::UserPermissionProvider;
use crate::config::EngineConfig;
use crate::data_scope::DataScopeResolver;
use crate::error::{ConfigurationError, PermissionError};
use crate::models::{AttributeMap, PermissionLevel, Resource, SessionInfoExt, User};
use crate::rbac::RbacEvaluator;

/// Log target for requests that reach a guard without an identity.
pub const IDENTITY_LOG_TARGET: &str = "permission_sdk::identity";
/// Log target for grant/deny decisions.
pub const DECISION_LOG_TARGET: &str = "permission_sdk::decision";

/// Which check let the request through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantedBy {
    Rbac,
    Abac,
    /// The operation has no permission requirement.
    ScopeOnly,
}

/// Outcome of [`PermissionEngine::enforce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Granted {
        by: GrantedBy,
        /// Row restriction, present when the operation names a data type.
        scope: Option<AccessScope>,
    },
    Denied,
}

impl AccessDecision {
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    #[must_use]
    pub fn scope(&self) -> Option<&AccessScope> {
        match self {
            Self::Granted { scope, .. } => scope.as_ref(),
            Self::Denied => None,
        }
    }
}

/// Policy Enforcement Point.
///
/// # Example
///
/// ```ignore
/// let engine = PermissionEngine::new(registry, Arc::new(DataScopeResolver::with_builtins()), EngineConfig::default());
/// engine.scopes().validate(&[UPDATE_ORDER, LIST_ORDERS])?;
///
/// // inside a request scope established by the session boundary:
/// match engine.enforce(&UPDATE_ORDER, &order, &context).await? {
///     AccessDecision::Granted { scope, .. } => repo.update(order, scope).await,
///     AccessDecision::Denied => Err(Forbidden),
/// }
/// ```
pub struct PermissionEngine {
    provider: Arc<dyn UserPermissionProvider>,
    rbac: RbacEvaluator,
    abac: AbacEvaluator,
    scopes: Arc<DataScopeResolver>,
    config: EngineConfig,
}

impl PermissionEngine {
    #[must_use]
    pub fn new(
        provider: Arc<dyn UserPermissionProvider>,
        scopes: Arc<DataScopeResolver>,
        config: EngineConfig,
    ) -> Self {
        Self {
            rbac: RbacEvaluator::new(Arc::clone(&provider)),
            provider,
            abac: AbacEvaluator::new(),
            scopes,
            config,
        }
    }

    #[must_use]
    pub fn rbac(&self) -> &RbacEvaluator {
        &self.rbac
    }

    #[must_use]
    pub fn abac(&self) -> &AbacEvaluator {
        &self.abac
    }

    #[must_use]
    pub fn scopes(&self) -> &DataScopeResolver {
        &self.scopes
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// RBAC check over the session's roles within the session tenant.
    pub async fn check_rbac(
        &self,
        session: &SessionInfo,
        resource: &str,
        action: &str,
        level: PermissionLevel,
    ) -> bool {
        self.rbac
            .has_permission(resource, action, level, session.roles(), session.tenant_id())
            .await
    }

    /// Evaluate a single policy expression.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidExpression`] for malformed input.
    pub fn check_abac(
        &self,
        expression: &str,
        user: Option<&AttributeMap>,
        resource: Option<&AttributeMap>,
        context: Option<&AttributeMap>,
    ) -> Result<bool, ConfigurationError> {
        self.abac.evaluate(expression, user, resource, context)
    }

    /// `true` when at least one policy applies to `(resource, action)` in the
    /// session tenant and every applicable policy holds.
    ///
    /// # Errors
    ///
    /// [`PermissionError::Configuration`] when a policy fails to compile.
    pub async fn check_policies(
        &self,
        session: &SessionInfo,
        resource: &str,
        action: &str,
        resource_attrs: &AttributeMap,
        context: &AttributeMap,
    ) -> Result<bool, PermissionError> {
        let policies = match self
            .provider
            .get_policies(resource, action, session.tenant_id())
            .await
        {
            Ok(policies) => policies,
            Err(e) => {
                tracing::error!(resource, action, error = %e, "failed to load policies, denying");
                return Ok(false);
            }
        };

        let applicable: Vec<_> = policies
            .iter()
            .filter(|p| p.applies_to(resource, action))
            .collect();
        if applicable.is_empty() {
            return Ok(false);
        }

        let user = session.to_user();
        for policy in applicable {
            let holds = self.abac.evaluate(
                &policy.expression,
                Some(&user.attributes),
                Some(resource_attrs),
                Some(context),
            )?;
            if !holds {
                tracing::debug!(policy_id = %policy.policy_id, resource, action, "policy not satisfied");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Build the row restriction for `data_type`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::UnknownDataType`] (wrapped) for an unregistered key.
    pub async fn resolve_scope(
        &self,
        data_type: &str,
        user: &User,
        resource: &Resource,
    ) -> Result<AccessScope, PermissionError> {
        self.scopes.resolve(data_type, user, resource).await
    }

    /// Guard `op` for the request currently being served.
    ///
    /// # Errors
    ///
    /// - [`PermissionError::IdentityMissing`] when no session is bound
    /// - [`PermissionError::Configuration`] for an unknown data type or a
    ///   malformed policy
    #[tracing::instrument(skip_all, fields(operation = op.name))]
    pub async fn enforce(
        &self,
        op: &ProtectedOperation,
        resource: &Resource,
        context: &AttributeMap,
    ) -> Result<AccessDecision, PermissionError> {
        let Some(session) = SessionContext::current() else {
            tracing::warn!(
                target: IDENTITY_LOG_TARGET,
                operation = op.name,
                "identity missing: no session bound to the request"
            );
            return Err(PermissionError::IdentityMissing);
        };

        let by = match op.permission {
            None => GrantedBy::ScopeOnly,
            Some(required) => {
                if self
                    .check_rbac(&session, required.resource, required.action, required.level)
                    .await
                {
                    GrantedBy::Rbac
                } else if self
                    .check_policies(
                        &session,
                        required.resource,
                        required.action,
                        &resource.attributes,
                        context,
                    )
                    .await?
                {
                    GrantedBy::Abac
                } else {
                    tracing::debug!(
                        target: DECISION_LOG_TARGET,
                        operation = op.name,
                        user_id = %session.user_id(),
                        resource = required.resource,
                        action = required.action,
                        "access denied"
                    );
                    return Ok(AccessDecision::Denied);
                }
            }
        };

        let scope = match op.data_type {
            None => None,
            Some(data_type) => {
                let user = session.to_user();
                let scope = self.resolve_scope(data_type, &user, resource).await?;
                Some(self.isolate(scope, &session))
            }
        };

        tracing::debug!(
            target: DECISION_LOG_TARGET,
            operation = op.name,
            user_id = %session.user_id(),
            granted_by = ?by,
            "access granted"
        );
        Ok(AccessDecision::Granted { by, scope })
    }

    fn isolate(&self, scope: AccessScope, session: &SessionInfo) -> AccessScope {
        if !self.config.tenant_isolation {
            return scope;
        }
        match session.tenant_id() {
            Some(tenant) => {
                scope.and_filter(ScopeFilter::eq(self.config.tenant_property.as_str(), tenant))
            }
            None => AccessScope::deny_all(),
        }
    }
}

impl std::fmt::Debug for PermissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionEngine")
            .field("scopes", &self.scopes)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::{HashMap, HashSet};

    use async_trait::async_trait;
    use permkit_security::ScopeValue;
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;
    use crate::data_scope::data_types;
    use crate::error::ProviderError;
    use crate::models::{Permission, Policy, Role};
    use crate::pep::RequiredPermission;

    const UPDATE_ORDER: ProtectedOperation = ProtectedOperation {
        name: "update_order",
        resource_type: "order",
        permission: Some(RequiredPermission {
            resource: "order",
            action: "update",
            level: PermissionLevel::Write,
        }),
        data_type: Some(data_types::DEPARTMENT),
    };

    const LIST_OWN: ProtectedOperation = ProtectedOperation {
        name: "list_own",
        resource_type: "order",
        permission: None,
        data_type: Some(data_types::SELF_ONLY),
    };

    #[derive(Default)]
    struct Catalog {
        role_permissions: HashMap<String, HashSet<Permission>>,
        policies: Vec<Policy>,
        policies_down: bool,
    }

    #[async_trait]
    impl UserPermissionProvider for Catalog {
        async fn get_permissions(
            &self,
            _user: &User,
        ) -> Result<HashSet<Permission>, ProviderError> {
            Ok(HashSet::new())
        }

        async fn get_roles(
            &self,
            _user_id: &str,
            _tenant_id: Option<&str>,
        ) -> Result<Vec<Role>, ProviderError> {
            Ok(Vec::new())
        }

        async fn get_role_permissions(
            &self,
            role_id: &str,
            _tenant_id: Option<&str>,
        ) -> Result<HashSet<Permission>, ProviderError> {
            Ok(self
                .role_permissions
                .get(role_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_policies(
            &self,
            resource: &str,
            action: &str,
            _tenant_id: Option<&str>,
        ) -> Result<Vec<Policy>, ProviderError> {
            if self.policies_down {
                return Err(ProviderError::Unavailable("timeout".to_owned()));
            }
            Ok(self
                .policies
                .iter()
                .filter(|p| p.applies_to(resource, action))
                .cloned()
                .collect())
        }
    }

    fn catalog() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.role_permissions.insert(
            "editor".to_owned(),
            HashSet::from([Permission::new(
                "p1",
                "order",
                "update",
                PermissionLevel::Write,
            )]),
        );
        catalog
    }

    fn engine_with(catalog: Catalog, config: EngineConfig) -> PermissionEngine {
        PermissionEngine::new(
            Arc::new(catalog),
            Arc::new(DataScopeResolver::with_builtins()),
            config,
        )
    }

    fn session(roles: &[&str]) -> SessionInfo {
        SessionInfo::builder()
            .user_id("u1")
            .tenant_id("t1")
            .roles(roles.iter().copied())
            .abac_attribute("deptId", "d1")
            .abac_attribute("department", "eng")
            .build()
    }

    fn eng_order() -> Resource {
        Resource::new("order")
            .with_id("o1")
            .with_attribute("department", "eng")
    }

    async fn enforce_as(
        engine: &PermissionEngine,
        session: SessionInfo,
        op: &ProtectedOperation,
        resource: &Resource,
    ) -> Result<AccessDecision, PermissionError> {
        SessionContext::scope(async {
            SessionContext::establish(session).unwrap();
            engine.enforce(op, resource, &AttributeMap::new()).await
        })
        .await
    }

    fn row(dept: &str, tenant: &str) -> HashMap<&'static str, ScopeValue> {
        HashMap::from([
            ("dept_id", ScopeValue::from(dept)),
            ("tenant_id", ScopeValue::from(tenant)),
        ])
    }

    #[tokio::test]
    async fn rbac_grant_resolves_tenant_narrowed_scope() {
        let engine = engine_with(catalog(), EngineConfig::default());
        let decision = enforce_as(&engine, session(&["editor"]), &UPDATE_ORDER, &eng_order())
            .await
            .unwrap();

        let AccessDecision::Granted { by, scope } = decision else {
            panic!("expected grant, got {decision:?}");
        };
        assert_eq!(by, GrantedBy::Rbac);
        let scope = scope.unwrap();
        assert!(scope.matches(&row("d1", "t1")));
        assert!(!scope.matches(&row("d1", "t2")));
        assert!(!scope.matches(&row("d2", "t1")));
    }

    #[tokio::test]
    async fn without_isolation_scope_is_not_narrowed() {
        let config = EngineConfig {
            tenant_isolation: false,
            ..EngineConfig::default()
        };
        let engine = engine_with(catalog(), config);
        let decision = enforce_as(&engine, session(&["editor"]), &UPDATE_ORDER, &eng_order())
            .await
            .unwrap();

        assert!(decision.scope().unwrap().matches(&row("d1", "t2")));
    }

    #[tokio::test]
    async fn abac_policy_is_the_fallback() {
        let mut catalog = catalog();
        catalog.policies.push(Policy::new(
            "pol-1",
            "order",
            "update",
            "user.department == resource.department",
        ));
        let engine = engine_with(catalog, EngineConfig::default());

        let granted = enforce_as(&engine, session(&[]), &UPDATE_ORDER, &eng_order())
            .await
            .unwrap();
        assert!(matches!(
            granted,
            AccessDecision::Granted {
                by: GrantedBy::Abac,
                ..
            }
        ));

        let sales = Resource::new("order").with_attribute("department", "sales");
        let denied = enforce_as(&engine, session(&[]), &UPDATE_ORDER, &sales)
            .await
            .unwrap();
        assert_eq!(denied, AccessDecision::Denied);
    }

    #[tokio::test]
    async fn applicable_policies_are_and_combined() {
        let mut catalog = catalog();
        catalog.policies.push(Policy::new(
            "pol-1",
            "order",
            "update",
            "user.department == resource.department",
        ));
        catalog.policies.push(Policy::new(
            "pol-2",
            "order",
            "update",
            "resource.status == 'open'",
        ));
        let engine = engine_with(catalog, EngineConfig::default());

        let closed = eng_order().with_attribute("status", "closed");
        let open = eng_order().with_attribute("status", "open");
        assert_eq!(
            enforce_as(&engine, session(&[]), &UPDATE_ORDER, &closed)
                .await
                .unwrap(),
            AccessDecision::Denied
        );
        assert!(
            enforce_as(&engine, session(&[]), &UPDATE_ORDER, &open)
                .await
                .unwrap()
                .is_granted()
        );
    }

    #[tokio::test]
    async fn no_roles_and_no_policies_is_denied() {
        let engine = engine_with(catalog(), EngineConfig::default());
        let decision = enforce_as(&engine, session(&[]), &UPDATE_ORDER, &eng_order())
            .await
            .unwrap();
        assert_eq!(decision, AccessDecision::Denied);
        assert!(decision.scope().is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn policy_source_failure_denies() {
        let mut catalog = catalog();
        catalog.policies_down = true;
        let engine = engine_with(catalog, EngineConfig::default());

        let decision = enforce_as(&engine, session(&[]), &UPDATE_ORDER, &eng_order())
            .await
            .unwrap();
        assert_eq!(decision, AccessDecision::Denied);
        assert!(logs_contain("failed to load policies, denying"));
    }

    #[tokio::test]
    async fn malformed_policy_is_a_configuration_error() {
        let mut catalog = catalog();
        catalog
            .policies
            .push(Policy::new("pol-1", "order", "update", "user.department ="));
        let engine = engine_with(catalog, EngineConfig::default());

        let err = enforce_as(&engine, session(&[]), &UPDATE_ORDER, &eng_order())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PermissionError::Configuration(ConfigurationError::InvalidExpression { .. })
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn enforce_without_session_is_identity_missing() {
        let engine = engine_with(catalog(), EngineConfig::default());

        let outside = engine
            .enforce(&UPDATE_ORDER, &eng_order(), &AttributeMap::new())
            .await;
        assert_eq!(outside, Err(PermissionError::IdentityMissing));

        let unbound = SessionContext::scope(engine.enforce(
            &UPDATE_ORDER,
            &eng_order(),
            &AttributeMap::new(),
        ))
        .await;
        assert_eq!(unbound, Err(PermissionError::IdentityMissing));
        assert!(logs_contain("identity missing"));
    }

    #[tokio::test]
    async fn scope_only_operation_needs_no_permission() {
        let engine = engine_with(catalog(), EngineConfig::default());
        let decision = enforce_as(&engine, session(&[]), &LIST_OWN, &eng_order())
            .await
            .unwrap();

        let AccessDecision::Granted { by, scope } = decision else {
            panic!("expected grant");
        };
        assert_eq!(by, GrantedBy::ScopeOnly);
        let scope = scope.unwrap();
        let mine = HashMap::from([
            ("owner_id", ScopeValue::from("u1")),
            ("tenant_id", ScopeValue::from("t1")),
        ]);
        assert!(scope.matches(&mine));
    }

    #[tokio::test]
    async fn session_without_tenant_gets_deny_all_under_isolation() {
        let engine = engine_with(catalog(), EngineConfig::default());
        let session = SessionInfo::builder().user_id("u1").build();
        let decision = enforce_as(&engine, session, &LIST_OWN, &eng_order())
            .await
            .unwrap();
        assert!(decision.scope().unwrap().is_deny_all());
    }

    #[tokio::test]
    async fn unknown_data_type_surfaces_from_enforce() {
        const BAD: ProtectedOperation = ProtectedOperation {
            name: "bad",
            resource_type: "order",
            permission: None,
            data_type: Some("region"),
        };
        let engine = engine_with(catalog(), EngineConfig::default());
        let err = enforce_as(&engine, session(&[]), &BAD, &eng_order())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PermissionError::Configuration(ConfigurationError::UnknownDataType {
                data_type: "region".to_owned()
            })
        );
    }

    #[test]
    fn check_abac_delegates() {
        let engine = engine_with(catalog(), EngineConfig::default());
        let user: AttributeMap = serde_json::from_value(json!({ "department": "eng" })).unwrap();
        let resource: AttributeMap =
            serde_json::from_value(json!({ "department": "eng" })).unwrap();

        assert_eq!(
            engine.check_abac(
                "user.department == resource.department",
                Some(&user),
                Some(&resource),
                None
            ),
            Ok(true)
        );
        assert_eq!(
            engine.check_abac("user.department == 'eng'", None, Some(&resource), None),
            Ok(false)
        );
    }
}
