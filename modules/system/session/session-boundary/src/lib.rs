#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Session Boundary
//!
//! Turns the bearer token of each inbound request into a request-scoped
//! [`permkit_security::SessionInfo`] binding, and guarantees that binding is
//! gone when the request ends.
//!
//! - [`TokenParser`] - pluggable token to session mapping
//! - [`RequestBoundary`] - admission rules and the per-request scope
//! - [`session_middleware`] - axum layer over the boundary
//! - [`load_config`] - YAML + `PERMKIT_*` environment configuration
//!
//! ## Admission
//!
//! | Situation                        | `require_auth: true` | `require_auth: false` |
//! |----------------------------------|----------------------|-----------------------|
//! | valid token                      | bound                | bound                 |
//! | missing / invalid token          | 401                  | anonymous             |
//! | expired session                  | 401                  | anonymous             |
//! | tenant header != token tenant    | 403                  | anonymous             |
//! | token parser unavailable         | 503                  | anonymous             |

pub mod boundary;
pub mod config;
pub mod middleware;
pub mod token;

pub use boundary::{BoundaryRejection, Credentials, RequestBoundary};
pub use config::{SessionBoundaryConfig, load_config};
pub use middleware::session_middleware;
pub use token::{TokenParseError, TokenParser};
