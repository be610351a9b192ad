//! Error types for the permission engine.
//!
//! Access denial is never an error: evaluators return `false` and the
//! enforcer returns [`crate::pep::AccessDecision::Denied`]. Errors are
//! reserved for deployment defects and violated preconditions.

use thiserror::Error;

/// A deployment-time misconfiguration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No data scope handler is registered under the requested key.
    #[error("no data scope handler registered for data type '{data_type}'")]
    UnknownDataType { data_type: String },

    /// A second handler was registered under an existing key.
    #[error("data scope handler for data type '{data_type}' is already registered")]
    DuplicateDataType { data_type: String },

    /// A policy expression failed to compile.
    ///
    /// Carries the byte offset and a description of the syntax problem,
    /// never the attribute values the expression would be evaluated against.
    #[error("invalid policy expression at offset {position}: {reason}")]
    InvalidExpression { position: usize, reason: String },
}

/// Errors surfaced by the engine's public surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// An identity was required but no session is bound to the request.
    #[error("identity missing: no session is bound to the current request")]
    IdentityMissing,
}

/// Failures of a permission provider.
///
/// These never escape an evaluator; they are logged and turned into a deny.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The backing store cannot be reached.
    #[error("permission source unavailable: {0}")]
    Unavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}
