//! Policy Enforcement Point helpers.
//!
//! - [`ProtectedOperation`] / [`RequiredPermission`] - declarative markers
//! - [`PermissionEngine`] - combines RBAC, ABAC and data scopes per request
//! - [`AccessDecision`] - the outcome of [`PermissionEngine::enforce`]

pub mod engine;
pub mod operation;

pub use engine::{AccessDecision, GrantedBy, PermissionEngine};
pub use operation::{ProtectedOperation, RequiredPermission};
