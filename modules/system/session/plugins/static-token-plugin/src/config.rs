//! Configuration for the static token plugin.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// User ID of the identity returned in `accept_all` mode.
pub const DEFAULT_USER_ID: &str = "dev-user";

/// Tenant of the identity returned in `accept_all` mode.
pub const DEFAULT_TENANT_ID: &str = "dev-tenant";

/// Plugin configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticTokenPluginConfig {
    /// Token acceptance mode.
    pub mode: TokenMode,

    /// Identity returned in `accept_all` mode.
    pub default_identity: IdentityConfig,

    /// Static token-to-identity mappings for `static_tokens` mode.
    pub tokens: Vec<TokenMapping>,
}

impl Default for StaticTokenPluginConfig {
    fn default() -> Self {
        Self {
            mode: TokenMode::AcceptAll,
            default_identity: IdentityConfig::default(),
            tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenMode {
    /// Accept any non-empty token and return the default identity.
    #[default]
    AcceptAll,
    /// Map specific tokens to specific identities.
    StaticTokens,
}

/// Session fields produced for a token.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    pub user_id: String,

    pub tenant_id: Option<String>,

    pub client_id: Option<String>,

    /// Role identifiers asserted by the session.
    pub roles: Vec<String>,

    /// ABAC attributes, e.g. `department` or `deptId`.
    pub attributes: HashMap<String, serde_json::Value>,

    /// Fixed expiry. `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.to_owned(),
            tenant_id: Some(DEFAULT_TENANT_ID.to_owned()),
            client_id: None,
            roles: Vec::new(),
            attributes: HashMap::new(),
            expires_at: None,
        }
    }
}

/// Maps a static token to a specific identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenMapping {
    /// The bearer token value to match.
    pub token: String,
    /// The identity to return when this token is presented.
    pub identity: IdentityConfig,
}
