#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod access_scope;
pub mod context;
pub mod session;

pub use access_scope::{
    AccessScope, ScopeConstraint, ScopeFilter, ScopeRow, ScopeValue, scope_properties,
};
pub use context::{
    AbacAttributes, SessionInfo, SessionInfoBuilder, TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH,
};
pub use session::{SessionContext, SessionError};
