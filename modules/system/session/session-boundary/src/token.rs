//! Token parsing seam.
//!
//! The boundary never inspects token bytes itself. Signature checks, claim
//! mapping and key rotation live behind [`TokenParser`].

use async_trait::async_trait;
use permkit_security::SessionInfo;

/// Why a bearer token could not be turned into a session.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TokenParseError {
    /// Unknown, malformed or forged token.
    #[error("token rejected: {0}")]
    Invalid(String),

    /// The token was valid but its lifetime has ended.
    #[error("token expired")]
    Expired,

    /// The parser could not reach its backing store or key material.
    #[error("token parser unavailable: {0}")]
    Unavailable(String),
}

/// Turns a raw bearer token into the identity for one request.
#[async_trait]
pub trait TokenParser: Send + Sync {
    /// Parse `token` into a [`SessionInfo`].
    ///
    /// # Errors
    ///
    /// Returns [`TokenParseError`] when the token cannot be accepted.
    async fn parse(&self, token: &str) -> Result<SessionInfo, TokenParseError>;
}
