#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Permission SDK
//!
//! This crate provides the authorization layer shared by services:
//!
//! - [`models`] - catalog types ([`Permission`], [`Role`], [`Policy`], ...)
//! - [`UserPermissionProvider`] - pluggable catalog source, held by
//!   [`PermissionProviderRegistry`]
//! - [`CachedPermissionProvider`] - TTL cache decorator for providers
//! - [`RbacEvaluator`] - role-based checks with level ordering
//! - [`AbacEvaluator`] - attribute-based policy expressions
//! - [`DataScopeResolver`] - row-level restrictions keyed by data type
//! - [`pep`] - [`PermissionEngine`] and the [`ProtectedOperation`] markers
//!
//! ## Usage
//!
//! ```ignore
//! use permission_sdk::{
//!     AccessDecision, DataScopeResolver, EngineConfig, PermissionEngine,
//!     PermissionLevel, PermissionProviderRegistry, ProtectedOperation,
//!     RequiredPermission, data_types,
//! };
//!
//! const UPDATE_ORDER: ProtectedOperation = ProtectedOperation {
//!     name: "update_order",
//!     resource_type: "order",
//!     permission: Some(RequiredPermission {
//!         resource: "order",
//!         action: "update",
//!         level: PermissionLevel::Write,
//!     }),
//!     data_type: Some(data_types::DEPARTMENT),
//! };
//!
//! let registry = Arc::new(PermissionProviderRegistry::new());
//! registry.set(Arc::new(MyProvider::new()));
//!
//! let scopes = Arc::new(DataScopeResolver::with_builtins());
//! scopes.validate(&[UPDATE_ORDER])?;
//!
//! let engine = PermissionEngine::new(registry, scopes, EngineConfig::default());
//! let decision = engine.enforce(&UPDATE_ORDER, &order, &context).await?;
//! ```

pub mod abac;
pub mod api;
pub mod config;
pub mod data_scope;
pub mod error;
pub mod models;
pub mod pep;
pub mod provider_cache;
pub mod rbac;

// Re-export main types at crate root
pub use abac::{AbacEvaluator, Expression};
pub use api::{DefaultPermissionProvider, PermissionProviderRegistry, UserPermissionProvider};
pub use config::EngineConfig;
pub use data_scope::{
    AllScopeHandler, AttributeScopeHandler, DataScopeHandler, DataScopeResolver, DataScopeRule,
    SelfScopeHandler, data_types,
};
pub use error::{ConfigurationError, PermissionError, ProviderError};
pub use models::{
    AttributeMap, Permission, PermissionLevel, Policy, Resource, Role, SessionInfoExt, User,
};
pub use pep::{AccessDecision, GrantedBy, PermissionEngine, ProtectedOperation, RequiredPermission};
pub use provider_cache::CachedPermissionProvider;
pub use rbac::RbacEvaluator;
