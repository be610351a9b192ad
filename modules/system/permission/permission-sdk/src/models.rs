//! Permission catalog model: the data the evaluators decide against.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use permkit_security::SessionInfo;
use serde::{Deserialize, Serialize};

/// Open attribute map (key → JSON value) used for ABAC and scope handlers.
pub type AttributeMap = HashMap<String, serde_json::Value>;

/// Attribute key under which a user's tenant is exposed to policies.
pub const TENANT_ATTRIBUTE: &str = "tenantId";

/// The subject of a decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub attributes: AttributeMap,
}

impl User {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Derive the request's user from its session.
    ///
    /// ABAC attributes become user attributes; the session tenant is also
    /// exposed under [`TENANT_ATTRIBUTE`] unless a claim already set it.
    #[must_use]
    pub fn from_session(session: &SessionInfo) -> Self {
        let mut attributes: AttributeMap = session
            .abac_attributes()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(tenant) = session.tenant_id() {
            attributes
                .entry(TENANT_ATTRIBUTE.to_owned())
                .or_insert_with(|| serde_json::Value::String(tenant.to_owned()));
        }
        Self {
            user_id: session.user_id().to_owned(),
            tenant_id: session.tenant_id().map(ToOwned::to_owned),
            attributes,
        }
    }
}

/// Conversion from the request's session to the evaluators' [`User`].
pub trait SessionInfoExt {
    fn to_user(&self) -> User;
}

impl SessionInfoExt for SessionInfo {
    fn to_user(&self) -> User {
        User::from_session(self)
    }
}

/// The object being protected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Resource type, e.g. `"order"`, `"user"`.
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub attributes: AttributeMap,
}

impl Resource {
    #[must_use]
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    #[must_use]
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Authority of a permission. Declaration order is the authority order.
///
/// A single total order is shared by all resource types.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    #[default]
    #[serde(alias = "read")]
    Read,
    #[serde(alias = "write")]
    Write,
    #[serde(alias = "delete")]
    Delete,
    #[serde(alias = "admin")]
    Admin,
}

impl PermissionLevel {
    /// Numeric rank, 1 (`READ`) through 4 (`ADMIN`).
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Read => 1,
            Self::Write => 2,
            Self::Delete => 3,
            Self::Admin => 4,
        }
    }
}

/// A grant of `level` authority for `action` on `resource`.
///
/// Equality and hashing follow catalog identity (`permission_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub permission_id: String,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub level: PermissionLevel,
}

impl Permission {
    #[must_use]
    pub fn new(
        permission_id: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
        level: PermissionLevel,
    ) -> Self {
        Self {
            permission_id: permission_id.into(),
            resource: resource.into(),
            action: action.into(),
            description: String::new(),
            level,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Exact string equality on both resource and action.
    #[must_use]
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }

    /// `true` when `other` covers the same resource/action with at least
    /// this permission's authority.
    #[must_use]
    pub fn is_subset_of(&self, other: &Permission) -> bool {
        self.matches(&other.resource, &other.action) && self.level <= other.level
    }

    /// `true` when holding this permission authorizes `required` on
    /// `(resource, action)`.
    #[must_use]
    pub fn authorizes(&self, resource: &str, action: &str, required: PermissionLevel) -> bool {
        self.matches(resource, action) && required <= self.level
    }
}

impl PartialEq for Permission {
    fn eq(&self, other: &Self) -> bool {
        self.permission_id == other.permission_id
    }
}

impl Eq for Permission {}

impl Hash for Permission {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.permission_id.hash(state);
    }
}

/// A named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub permissions: HashSet<Permission>,
}

impl Role {
    #[must_use]
    pub fn new(role_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role_id: role_id.into(),
            name: name.into(),
            tenant_id: None,
            permissions: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission);
        self
    }

    #[must_use]
    pub fn grants(&self, resource: &str, action: &str, level: PermissionLevel) -> bool {
        self.permissions
            .iter()
            .any(|p| p.authorizes(resource, action, level))
    }
}

/// An ABAC policy: an expression that must hold for `action` on `resource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub policy_id: String,
    #[serde(default)]
    pub name: String,
    pub resource: String,
    pub action: String,
    pub expression: String,
}

impl Policy {
    #[must_use]
    pub fn new(
        policy_id: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            policy_id: policy_id.into(),
            name: String::new(),
            resource: resource.into(),
            action: action.into(),
            expression: expression.into(),
        }
    }

    #[must_use]
    pub fn applies_to(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const LEVELS: [PermissionLevel; 4] = [
        PermissionLevel::Read,
        PermissionLevel::Write,
        PermissionLevel::Delete,
        PermissionLevel::Admin,
    ];

    #[test]
    fn levels_are_totally_ordered() {
        assert_eq!(
            LEVELS.map(PermissionLevel::rank),
            [1, 2, 3, 4],
            "ranks follow declaration order"
        );
        assert!(PermissionLevel::Read < PermissionLevel::Write);
        assert!(PermissionLevel::Delete < PermissionLevel::Admin);
    }

    #[test]
    fn subset_iff_rank_not_greater() {
        for p in LEVELS {
            for q in LEVELS {
                let a = Permission::new("a", "orders", "read", p);
                let b = Permission::new("b", "orders", "read", q);
                assert_eq!(a.is_subset_of(&b), p.rank() <= q.rank(), "{p:?} vs {q:?}");
            }
        }
    }

    #[test]
    fn subset_requires_same_resource_and_action() {
        let read = Permission::new("a", "orders", "read", PermissionLevel::Read);
        let admin_other_action = Permission::new("b", "orders", "write", PermissionLevel::Admin);
        let admin_other_resource = Permission::new("c", "users", "read", PermissionLevel::Admin);

        assert!(!read.is_subset_of(&admin_other_action));
        assert!(!read.is_subset_of(&admin_other_resource));
    }

    #[test]
    fn matches_is_exact() {
        let p = Permission::new("p1", "orders", "read", PermissionLevel::Admin);
        assert!(p.matches("orders", "read"));
        assert!(!p.matches("orders", "write"));
        assert!(!p.matches("Orders", "read"));
        assert!(!p.matches("orders ", "read"));
        assert!(!p.matches("order", "read"));
        assert!(!p.matches("", ""));
    }

    #[test]
    fn permission_identity_is_permission_id() {
        let a = Permission::new("p1", "orders", "read", PermissionLevel::Read);
        let b = Permission::new("p1", "users", "write", PermissionLevel::Admin);
        let c = Permission::new("p2", "orders", "read", PermissionLevel::Read);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let role = Role::new("r1", "editor").with_permission(a).with_permission(b);
        assert_eq!(role.permissions.len(), 1);
    }

    #[test]
    fn level_deserializes_from_either_case() {
        let upper: PermissionLevel = serde_json::from_str("\"ADMIN\"").unwrap();
        let lower: PermissionLevel = serde_json::from_str("\"write\"").unwrap();
        assert_eq!(upper, PermissionLevel::Admin);
        assert_eq!(lower, PermissionLevel::Write);
    }

    #[test]
    fn user_from_session_exposes_tenant_attribute() {
        let session = SessionInfo::builder()
            .user_id("u1")
            .tenant_id("t1")
            .abac_attribute("deptId", "d1")
            .build();

        let user = session.to_user();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.tenant_id.as_deref(), Some("t1"));
        assert_eq!(user.attribute("deptId"), Some(&serde_json::json!("d1")));
        assert_eq!(user.attribute(TENANT_ATTRIBUTE), Some(&serde_json::json!("t1")));
    }
}
