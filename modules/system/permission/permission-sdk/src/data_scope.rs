//! Row-level data scopes keyed by data type.
//!
//! A handler turns a (user, resource) pair into an [`AccessScope`] that the
//! storage layer applies as a row filter. Handlers are looked up by their
//! `data_type` key; an unknown key is a configuration error and never widens
//! access.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use permkit_security::{AccessScope, ScopeFilter, ScopeValue, scope_properties};

use crate::error::{ConfigurationError, PermissionError};
use crate::models::{Resource, TENANT_ATTRIBUTE, User};
use crate::pep::ProtectedOperation;

/// Built-in data type keys.
pub mod data_types {
    /// No restriction.
    pub const ALL: &str = "all";
    /// Rows owned by the caller.
    pub const SELF_ONLY: &str = "self";
    /// Rows of the caller's department.
    pub const DEPARTMENT: &str = "department";
    /// Rows of the caller's tenant.
    pub const TENANT: &str = "tenant";
}

/// User attribute carrying the caller's department id.
pub const DEPARTMENT_ATTRIBUTE: &str = "deptId";

/// Builds the row restriction for one data type.
#[async_trait]
pub trait DataScopeHandler: Send + Sync {
    /// Restriction for `user` acting on `resource`.
    ///
    /// # Errors
    ///
    /// Implementations may fail with [`PermissionError`]; the built-ins never do.
    async fn build_restriction(
        &self,
        user: &User,
        resource: &Resource,
    ) -> Result<AccessScope, PermissionError>;
}

/// `all`: every row.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllScopeHandler;

#[async_trait]
impl DataScopeHandler for AllScopeHandler {
    async fn build_restriction(
        &self,
        _user: &User,
        _resource: &Resource,
    ) -> Result<AccessScope, PermissionError> {
        Ok(AccessScope::allow_all())
    }
}

/// `self`: rows whose `owner_id` is the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfScopeHandler;

#[async_trait]
impl DataScopeHandler for SelfScopeHandler {
    async fn build_restriction(
        &self,
        user: &User,
        _resource: &Resource,
    ) -> Result<AccessScope, PermissionError> {
        if user.user_id.is_empty() {
            return Ok(AccessScope::deny_all());
        }
        Ok(AccessScope::for_property(
            scope_properties::OWNER_ID,
            user.user_id.as_str(),
        ))
    }
}

/// Restricts a row property to the value of one user attribute.
///
/// A scalar attribute yields `property = value`, an array yields
/// `property IN (values)`. A missing, null or unusable attribute yields
/// deny-all.
#[derive(Debug, Clone)]
pub struct AttributeScopeHandler {
    attribute: String,
    property: String,
}

impl AttributeScopeHandler {
    #[must_use]
    pub fn new(attribute: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            property: property.into(),
        }
    }

    /// `department`: `dept_id = user.attributes["deptId"]`.
    #[must_use]
    pub fn department() -> Self {
        Self::new(DEPARTMENT_ATTRIBUTE, scope_properties::DEPT_ID)
    }

    /// `tenant`: `tenant_id = user.attributes["tenantId"]`.
    #[must_use]
    pub fn tenant() -> Self {
        Self::new(TENANT_ATTRIBUTE, scope_properties::TENANT_ID)
    }

    fn restriction(&self, user: &User) -> AccessScope {
        match user.attribute(&self.attribute) {
            Some(serde_json::Value::Array(items)) => {
                let values: Vec<ScopeValue> =
                    items.iter().filter_map(ScopeValue::from_json).collect();
                if values.is_empty() {
                    return AccessScope::deny_all();
                }
                AccessScope::allow_all().and_filter(ScopeFilter::r#in(&*self.property, values))
            }
            Some(value) => match ScopeValue::from_json(value) {
                Some(v) => AccessScope::for_property(&*self.property, v),
                None => AccessScope::deny_all(),
            },
            None => AccessScope::deny_all(),
        }
    }
}

#[async_trait]
impl DataScopeHandler for AttributeScopeHandler {
    async fn build_restriction(
        &self,
        user: &User,
        _resource: &Resource,
    ) -> Result<AccessScope, PermissionError> {
        let scope = self.restriction(user);
        if scope.is_deny_all() {
            tracing::debug!(
                user_id = %user.user_id,
                attribute = %self.attribute,
                "scope attribute unusable, denying all rows"
            );
        }
        Ok(scope)
    }
}

/// Association of a data type key to its handler.
#[derive(Clone)]
pub struct DataScopeRule {
    pub data_type: String,
    pub handler: Arc<dyn DataScopeHandler>,
}

impl DataScopeRule {
    #[must_use]
    pub fn new(data_type: impl Into<String>, handler: Arc<dyn DataScopeHandler>) -> Self {
        Self {
            data_type: data_type.into(),
            handler,
        }
    }
}

impl std::fmt::Debug for DataScopeRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataScopeRule")
            .field("data_type", &self.data_type)
            .finish_non_exhaustive()
    }
}

/// Registry of [`DataScopeHandler`]s.
#[derive(Default)]
pub struct DataScopeResolver {
    handlers: DashMap<String, Arc<dyn DataScopeHandler>>,
}

impl DataScopeResolver {
    /// An empty resolver. Every lookup fails until handlers are registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver with `all`, `self`, `department` and `tenant` registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let resolver = Self::new();
        for rule in [
            DataScopeRule::new(data_types::ALL, Arc::new(AllScopeHandler)),
            DataScopeRule::new(data_types::SELF_ONLY, Arc::new(SelfScopeHandler)),
            DataScopeRule::new(
                data_types::DEPARTMENT,
                Arc::new(AttributeScopeHandler::department()),
            ),
            DataScopeRule::new(data_types::TENANT, Arc::new(AttributeScopeHandler::tenant())),
        ] {
            resolver.handlers.insert(rule.data_type, rule.handler);
        }
        resolver
    }

    /// Register `handler` under `data_type`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::DuplicateDataType`] when the key is taken.
    pub fn register(
        &self,
        data_type: impl Into<String>,
        handler: Arc<dyn DataScopeHandler>,
    ) -> Result<(), ConfigurationError> {
        match self.handlers.entry(data_type.into()) {
            Entry::Occupied(entry) => Err(ConfigurationError::DuplicateDataType {
                data_type: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                tracing::debug!(data_type = %entry.key(), "data scope handler registered");
                entry.insert(handler);
                Ok(())
            }
        }
    }

    /// Register a [`DataScopeRule`].
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::DuplicateDataType`] when the key is taken.
    pub fn register_rule(&self, rule: DataScopeRule) -> Result<(), ConfigurationError> {
        self.register(rule.data_type, rule.handler)
    }

    #[must_use]
    pub fn contains(&self, data_type: &str) -> bool {
        self.handlers.contains_key(data_type)
    }

    /// Registered keys, sorted.
    #[must_use]
    pub fn data_types(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Build the restriction for `data_type`.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::UnknownDataType`] when nothing is registered
    ///   under `data_type`
    /// - whatever the handler returns
    #[tracing::instrument(skip_all, fields(data_type = %data_type, user_id = %user.user_id))]
    pub async fn resolve(
        &self,
        data_type: &str,
        user: &User,
        resource: &Resource,
    ) -> Result<AccessScope, PermissionError> {
        // Clone the handler out so no map guard is held across the await.
        let handler = self
            .handlers
            .get(data_type)
            .map(|entry| Arc::clone(entry.value()));
        let Some(handler) = handler else {
            tracing::error!("no data scope handler registered");
            return Err(ConfigurationError::UnknownDataType {
                data_type: data_type.to_owned(),
            }
            .into());
        };
        handler.build_restriction(user, resource).await
    }

    /// Check that every operation's data type has a handler.
    ///
    /// Meant to run once at startup so a misconfiguration fails fast.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::UnknownDataType`] for the first unregistered key.
    pub fn validate(&self, operations: &[ProtectedOperation]) -> Result<(), ConfigurationError> {
        for op in operations {
            if let Some(data_type) = op.data_type
                && !self.contains(data_type)
            {
                tracing::error!(operation = op.name, data_type, "operation names an unregistered data type");
                return Err(ConfigurationError::UnknownDataType {
                    data_type: data_type.to_owned(),
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for DataScopeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataScopeResolver")
            .field("data_types", &self.data_types())
            .finish()
    }
}
