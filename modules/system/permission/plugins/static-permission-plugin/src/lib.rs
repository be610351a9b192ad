#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static Permission Plugin
//!
//! A [`permission_sdk::UserPermissionProvider`] whose catalog comes from
//! configuration, for development, tests and small deployments.
//!
//! - Roles may be global or bound to one tenant. A tenant-bound role shadows
//!   a global role with the same id for that tenant only.
//! - Role assignments and policies may likewise be global or tenant-bound.
//! - Policy expressions are compiled when the service is built, so a typo
//!   fails startup instead of denying at request time.
//!
//! ## Configuration
//!
//! ```yaml
//! static_permission_plugin:
//!   cache_ttl_secs: 60
//!   roles:
//!     - role_id: editor
//!       name: Editor
//!       permissions:
//!         - { permission_id: order-write, resource: order, action: update, level: WRITE }
//!   assignments:
//!     - { user_id: alice, tenant_id: acme, roles: [editor] }
//!   user_permissions:
//!     - user_id: bob
//!       permissions:
//!         - { permission_id: report-read, resource: report, action: view, level: READ }
//!   policies:
//!     - policy_id: same-dept
//!       resource: order
//!       action: update
//!       expression: "user.department == resource.department"
//! ```

pub mod config;
pub mod domain;

pub use config::StaticPermissionPluginConfig;
pub use domain::{Service, build_provider};

/// The static catalog under its provider name.
pub type StaticPermissionProvider = Service;
