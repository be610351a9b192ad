use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token type marker for access tokens.
pub const TOKEN_TYPE_ACCESS: &str = "ACCESS";
/// Token type marker for refresh tokens.
pub const TOKEN_TYPE_REFRESH: &str = "REFRESH";

/// Open attribute map carried by a session and evaluated by ABAC policies
/// (department, position, region, client device, custom claims, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbacAttributes(HashMap<String, serde_json::Value>);

impl AbacAttributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    /// Borrow the underlying map, e.g. to hand it to the ABAC evaluator.
    #[must_use]
    pub fn as_map(&self) -> &HashMap<String, serde_json::Value> {
        &self.0
    }
}

impl From<HashMap<String, serde_json::Value>> for AbacAttributes {
    fn from(map: HashMap<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<serde_json::Value>> FromIterator<(K, V)> for AbacAttributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// `SessionInfo` is the identity bound to one inbound request.
///
/// Built by the request boundary from a parsed token, read-only to
/// everything downstream, and cleared when the request completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Correlation ID for this session binding.
    session_id: Uuid,
    /// Authenticated user. Empty for a session without a subject.
    user_id: String,
    /// The tenant the request acts in.
    tenant_id: Option<String>,
    /// OAuth client that obtained the token.
    client_id: Option<String>,
    /// Role identifiers asserted for this request.
    #[serde(default)]
    roles: BTreeSet<String>,
    #[serde(default)]
    abac_attributes: AbacAttributes,
    /// `ACCESS` or `REFRESH`.
    token_type: Option<String>,
    issued_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    /// Original bearer token. Never serialized/persisted; `Debug` redacts it.
    #[serde(skip)]
    bearer_token: Option<SecretString>,
}

impl SessionInfo {
    #[must_use]
    pub fn builder() -> SessionInfoBuilder {
        SessionInfoBuilder::default()
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    #[must_use]
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    #[must_use]
    pub fn has_role(&self, role_id: &str) -> bool {
        self.roles.contains(role_id)
    }

    #[must_use]
    pub fn abac_attributes(&self) -> &AbacAttributes {
        &self.abac_attributes
    }

    #[must_use]
    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    #[must_use]
    pub fn bearer_token(&self) -> Option<&SecretString> {
        self.bearer_token.as_ref()
    }

    /// A session without an expiry never expires.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    #[must_use]
    pub fn is_access_token(&self) -> bool {
        self.token_type.as_deref() == Some(TOKEN_TYPE_ACCESS)
    }

    #[must_use]
    pub fn is_refresh_token(&self) -> bool {
        self.token_type.as_deref() == Some(TOKEN_TYPE_REFRESH)
    }
}

#[derive(Default)]
pub struct SessionInfoBuilder {
    session_id: Option<Uuid>,
    user_id: Option<String>,
    tenant_id: Option<String>,
    client_id: Option<String>,
    roles: BTreeSet<String>,
    abac_attributes: AbacAttributes,
    token_type: Option<String>,
    issued_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    bearer_token: Option<SecretString>,
}

impl SessionInfoBuilder {
    #[must_use]
    pub fn session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn role(mut self, role_id: impl Into<String>) -> Self {
        self.roles.insert(role_id.into());
        self
    }

    #[must_use]
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn abac_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.abac_attributes.insert(key, value);
        self
    }

    #[must_use]
    pub fn abac_attributes(mut self, attributes: AbacAttributes) -> Self {
        self.abac_attributes = attributes;
        self
    }

    #[must_use]
    pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    #[must_use]
    pub fn issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = Some(issued_at);
        self
    }

    #[must_use]
    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub fn bearer_token(mut self, token: impl Into<SecretString>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Build the session. A fresh `session_id` is generated unless one was set.
    #[must_use]
    pub fn build(self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.unwrap_or_else(Uuid::new_v4),
            user_id: self.user_id.unwrap_or_default(),
            tenant_id: self.tenant_id,
            client_id: self.client_id,
            roles: self.roles,
            abac_attributes: self.abac_attributes,
            token_type: self.token_type,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            bearer_token: self.bearer_token,
        }
    }
}
