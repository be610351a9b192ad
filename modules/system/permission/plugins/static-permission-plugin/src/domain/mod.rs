//! Domain layer for the static permission plugin.

mod provider;
pub mod service;

use std::sync::Arc;
use std::time::Duration;

use permission_sdk::{CachedPermissionProvider, UserPermissionProvider};

use crate::config::StaticPermissionPluginConfig;

pub use service::Service;

/// Build the provider described by `cfg`, behind a TTL cache when
/// `cache_ttl_secs` is non-zero.
///
/// # Errors
///
/// Returns an error if the catalog is invalid (see [`Service::from_config`]).
pub fn build_provider(
    cfg: &StaticPermissionPluginConfig,
) -> anyhow::Result<Arc<dyn UserPermissionProvider>> {
    let service: Arc<dyn UserPermissionProvider> = Arc::new(Service::from_config(cfg)?);
    if cfg.cache_ttl_secs == 0 {
        return Ok(service);
    }

    tracing::info!(ttl_secs = cfg.cache_ttl_secs, "static permission catalog cached");
    Ok(Arc::new(CachedPermissionProvider::new(
        service,
        Duration::from_secs(cfg.cache_ttl_secs),
    )))
}
