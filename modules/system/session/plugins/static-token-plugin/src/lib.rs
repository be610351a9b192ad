#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static Token Plugin
//!
//! A [`session_boundary::TokenParser`] backed by configuration, for
//! development and testing.
//!
//! ## Modes
//!
//! - **`accept_all`** (default): Accepts any non-empty token, returns the configured default
//!   identity.
//!
//! - **`static_tokens`**: Maps specific tokens to specific identities. Useful for E2E tests
//!   with distinct users and tenants.
//!
//! ## Configuration
//!
//! ```yaml
//! static_token_plugin:
//!   mode: static_tokens
//!   tokens:
//!     - token: "alice-dev"
//!       identity:
//!         user_id: "alice"
//!         tenant_id: "acme"
//!         roles: ["editor"]
//!         attributes:
//!           department: "sales"
//!           deptId: "d-7"
//! ```

pub mod config;
pub mod domain;

pub use config::{IdentityConfig, StaticTokenPluginConfig, TokenMapping, TokenMode};
pub use domain::Service;
