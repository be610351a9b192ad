//! TTL cache in front of a [`UserPermissionProvider`].
//!
//! Only successful lookups are cached; a provider error always reaches the
//! evaluator so it can fail closed. Entries expire on read, and a map that
//! has grown past `SWEEP_AT` entries drops every expired one on insert.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::api::UserPermissionProvider;
use crate::error::ProviderError;
use crate::models::{Permission, Policy, Role, User};

type TenantKey = Option<String>;

/// Size at which an insert first sweeps out expired entries.
const SWEEP_AT: usize = 1024;

struct Entry<V> {
    value: V,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

struct TtlMap<K, V> {
    entries: DashMap<K, Entry<V>>,
}

impl<K: Eq + Hash, V: Clone> TtlMap<K, V> {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        let hit = self.entries.get(key).and_then(|entry| {
            (!entry.is_expired(Instant::now())).then(|| entry.value.clone())
        });
        if hit.is_none() {
            self.entries
                .remove_if(key, |_, entry| entry.is_expired(Instant::now()));
        }
        hit
    }

    fn put(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        if self.entries.len() >= SWEEP_AT {
            self.entries.retain(|_, entry| !entry.is_expired(now));
        }
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: now.checked_add(ttl),
            },
        );
    }

    fn retain(&self, keep: impl Fn(&K) -> bool) {
        self.entries.retain(|k, _| keep(k));
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Caches each provider operation per key for `ttl`.
///
/// A TTL too large to add to the current instant caches until cleared.
///
/// [`UserPermissionProvider::get_permissions`] is keyed by user id and tenant
/// only, not by the [`User`]'s attributes. A provider that derives
/// permissions from attributes keeps answering from the cache after they
/// change, until the entry expires or the user is invalidated.
///
/// Call [`CachedPermissionProvider::invalidate_user`] after changing a
/// user's assignments or attributes and [`CachedPermissionProvider::clear`]
/// after changing roles or policies.
pub struct CachedPermissionProvider {
    inner: Arc<dyn UserPermissionProvider>,
    ttl: Duration,
    user_permissions: TtlMap<(String, TenantKey), HashSet<Permission>>,
    user_roles: TtlMap<(String, TenantKey), Vec<Role>>,
    role_permissions: TtlMap<(String, TenantKey), HashSet<Permission>>,
    policies: TtlMap<(String, String, TenantKey), Vec<Policy>>,
}

impl CachedPermissionProvider {
    #[must_use]
    pub fn new(inner: Arc<dyn UserPermissionProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            user_permissions: TtlMap::new(),
            user_roles: TtlMap::new(),
            role_permissions: TtlMap::new(),
            policies: TtlMap::new(),
        }
    }

    /// Drop everything cached for `user_id`, in every tenant.
    pub fn invalidate_user(&self, user_id: &str) {
        tracing::debug!(user_id, "invalidating cached permissions for user");
        self.user_permissions.retain(|(uid, _)| uid != user_id);
        self.user_roles.retain(|(uid, _)| uid != user_id);
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        tracing::debug!("clearing permission cache");
        self.user_permissions.clear();
        self.user_roles.clear();
        self.role_permissions.clear();
        self.policies.clear();
    }

    /// Number of cached entries across all operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.user_permissions.len()
            + self.user_roles.len()
            + self.role_permissions.len()
            + self.policies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CachedPermissionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedPermissionProvider")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

fn tenant_key(tenant_id: Option<&str>) -> TenantKey {
    tenant_id.map(ToOwned::to_owned)
}

#[async_trait]
impl UserPermissionProvider for CachedPermissionProvider {
    async fn get_permissions(&self, user: &User) -> Result<HashSet<Permission>, ProviderError> {
        let key = (user.user_id.clone(), user.tenant_id.clone());
        if let Some(hit) = self.user_permissions.get(&key) {
            return Ok(hit);
        }
        let value = self.inner.get_permissions(user).await?;
        self.user_permissions.put(key, value.clone(), self.ttl);
        Ok(value)
    }

    async fn get_roles(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<Role>, ProviderError> {
        let key = (user_id.to_owned(), tenant_key(tenant_id));
        if let Some(hit) = self.user_roles.get(&key) {
            return Ok(hit);
        }
        let value = self.inner.get_roles(user_id, tenant_id).await?;
        self.user_roles.put(key, value.clone(), self.ttl);
        Ok(value)
    }

    async fn get_role_permissions(
        &self,
        role_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<HashSet<Permission>, ProviderError> {
        let key = (role_id.to_owned(), tenant_key(tenant_id));
        if let Some(hit) = self.role_permissions.get(&key) {
            return Ok(hit);
        }
        let value = self.inner.get_role_permissions(role_id, tenant_id).await?;
        self.role_permissions.put(key, value.clone(), self.ttl);
        Ok(value)
    }

    async fn get_policies(
        &self,
        resource: &str,
        action: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<Policy>, ProviderError> {
        let key = (resource.to_owned(), action.to_owned(), tenant_key(tenant_id));
        if let Some(hit) = self.policies.get(&key) {
            return Ok(hit);
        }
        let value = self.inner.get_policies(resource, action, tenant_id).await?;
        self.policies.put(key, value.clone(), self.ttl);
        Ok(value)
    }
}
