//! Permission source API and the registry that holds the active source.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::{Permission, Policy, Role, User};

/// Supplies catalog data (permissions, roles, policies) to the evaluators.
///
/// Business code implements this trait and installs it into a
/// [`PermissionProviderRegistry`]:
///
/// ```ignore
/// let registry = PermissionProviderRegistry::new();
/// registry.set(Arc::new(MyDatabaseProvider::new(pool)));
///
/// let engine = PermissionEngine::new(Arc::new(registry), scopes, EngineConfig::default());
/// ```
///
/// Implementations are called concurrently and must return an immutable
/// snapshot per call.
#[async_trait]
pub trait UserPermissionProvider: Send + Sync {
    /// Permissions assigned directly to `user`.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the backing store cannot be reached
    /// - `Internal` for unexpected errors
    async fn get_permissions(&self, user: &User) -> Result<HashSet<Permission>, ProviderError>;

    /// Roles held by `user_id` within `tenant_id`.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the backing store cannot be reached
    /// - `Internal` for unexpected errors
    async fn get_roles(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<Role>, ProviderError>;

    /// Permissions attached to `role_id` within `tenant_id`.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the backing store cannot be reached
    /// - `Internal` for unexpected errors
    async fn get_role_permissions(
        &self,
        role_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<HashSet<Permission>, ProviderError>;

    /// ABAC policies that apply to `action` on `resource` within `tenant_id`.
    ///
    /// # Errors
    ///
    /// - `Unavailable` if the backing store cannot be reached
    /// - `Internal` for unexpected errors
    async fn get_policies(
        &self,
        resource: &str,
        action: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<Policy>, ProviderError>;
}

/// Provider used until business code installs its own. Grants nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPermissionProvider;

#[async_trait]
impl UserPermissionProvider for DefaultPermissionProvider {
    async fn get_permissions(&self, _user: &User) -> Result<HashSet<Permission>, ProviderError> {
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
        _role_id: &str,
        _tenant_id: Option<&str>,
    ) -> Result<HashSet<Permission>, ProviderError> {
        Ok(HashSet::new())
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

/// Holds the active [`UserPermissionProvider`].
///
/// Starts with [`DefaultPermissionProvider`]. Swapping is atomic: a call
/// already in flight finishes against the provider it started with, and
/// every later call sees the replacement.
pub struct PermissionProviderRegistry {
    active: ArcSwap<Arc<dyn UserPermissionProvider>>,
}

impl PermissionProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_provider(Arc::new(DefaultPermissionProvider))
    }

    #[must_use]
    pub fn with_provider(provider: Arc<dyn UserPermissionProvider>) -> Self {
        Self {
            active: ArcSwap::from_pointee(provider),
        }
    }

    /// Install `provider`, returning the one it replaces.
    pub fn set(&self, provider: Arc<dyn UserPermissionProvider>) -> Arc<dyn UserPermissionProvider> {
        tracing::info!("permission provider replaced");
        let previous = self.active.swap(Arc::new(provider));
        Arc::clone(&*previous)
    }

    /// Go back to the deny-everything default.
    pub fn reset(&self) {
        self.set(Arc::new(DefaultPermissionProvider));
    }

    /// Snapshot of the active provider.
    #[must_use]
    pub fn current(&self) -> Arc<dyn UserPermissionProvider> {
        let guard = self.active.load();
        Arc::clone(&**guard)
    }
}

impl Default for PermissionProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PermissionProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionProviderRegistry")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl UserPermissionProvider for PermissionProviderRegistry {
    async fn get_permissions(&self, user: &User) -> Result<HashSet<Permission>, ProviderError> {
        self.current().get_permissions(user).await
    }

    async fn get_roles(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<Role>, ProviderError> {
        self.current().get_roles(user_id, tenant_id).await
    }

    async fn get_role_permissions(
        &self,
        role_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<HashSet<Permission>, ProviderError> {
        self.current().get_role_permissions(role_id, tenant_id).await
    }

    async fn get_policies(
        &self,
        resource: &str,
        action: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<Policy>, ProviderError> {
        self.current().get_policies(resource, action, tenant_id).await
    }
}
