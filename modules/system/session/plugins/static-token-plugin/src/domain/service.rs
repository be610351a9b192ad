//! Service implementation for the static token plugin.

use std::collections::HashMap;

use permkit_security::{AbacAttributes, SessionInfo, TOKEN_TYPE_ACCESS};

use crate::config::{IdentityConfig, StaticTokenPluginConfig, TokenMode};

/// Static token-to-session service.
///
/// Provides token-to-identity mapping based on configuration mode:
/// - `accept_all`: Any non-empty token maps to the default identity
/// - `static_tokens`: Specific tokens map to specific identities
#[derive(Debug)]
pub struct Service {
    mode: TokenMode,
    default_identity: IdentityConfig,
    token_map: HashMap<String, IdentityConfig>,
}

impl Service {
    /// Create a service from plugin configuration.
    #[must_use]
    pub fn from_config(cfg: &StaticTokenPluginConfig) -> Self {
        let token_map: HashMap<String, IdentityConfig> = cfg
            .tokens
            .iter()
            .map(|m| (m.token.clone(), m.identity.clone()))
            .collect();

        Self {
            mode: cfg.mode.clone(),
            default_identity: cfg.default_identity.clone(),
            token_map,
        }
    }

    /// Look up the session for `bearer_token`.
    ///
    /// Returns `None` if the token is not recognized (in `static_tokens` mode)
    /// or empty.
    #[must_use]
    pub fn resolve(&self, bearer_token: &str) -> Option<SessionInfo> {
        if bearer_token.is_empty() {
            return None;
        }

        let identity = match &self.mode {
            TokenMode::AcceptAll => &self.default_identity,
            TokenMode::StaticTokens => self.token_map.get(bearer_token)?,
        };

        Some(build_session(identity, bearer_token))
    }
}

fn build_session(identity: &IdentityConfig, bearer_token: &str) -> SessionInfo {
    let attributes: AbacAttributes = identity
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut builder = SessionInfo::builder()
        .user_id(identity.user_id.clone())
        .roles(identity.roles.iter().cloned())
        .abac_attributes(attributes)
        .token_type(TOKEN_TYPE_ACCESS)
        .issued_at(chrono::Utc::now())
        .bearer_token(bearer_token.to_owned());
    if let Some(tenant_id) = &identity.tenant_id {
        builder = builder.tenant_id(tenant_id.clone());
    }
    if let Some(client_id) = &identity.client_id {
        builder = builder.client_id(client_id.clone());
    }
    if let Some(expires_at) = identity.expires_at {
        builder = builder.expires_at(expires_at);
    }
    builder.build()
}
