//! `TokenParser` implementation for the static token plugin.
//!
//! Expiry is left to the boundary, which compares `expires_at` against the
//! clock under its `reject_expired` setting.

use async_trait::async_trait;
use permkit_security::SessionInfo;
use session_boundary::{TokenParseError, TokenParser};

use super::service::Service;

#[async_trait]
impl TokenParser for Service {
    async fn parse(&self, token: &str) -> Result<SessionInfo, TokenParseError> {
        self.resolve(token).ok_or_else(|| {
            tracing::debug!("static token not recognized");
            TokenParseError::Invalid("unknown token".to_owned())
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;

    use permkit_security::SessionContext;
    use session_boundary::{Credentials, RequestBoundary, SessionBoundaryConfig};

    use super::*;
    use crate::config::{IdentityConfig, StaticTokenPluginConfig, TokenMapping, TokenMode};

    #[tokio::test]
    async fn parser_trait_accept_all_succeeds() {
        let service = Service::from_config(&StaticTokenPluginConfig::default());
        let parser: &dyn TokenParser = &service;

        assert!(parser.parse("any-token").await.is_ok());
    }

    #[tokio::test]
    async fn parser_trait_empty_token_invalid() {
        let service = Service::from_config(&StaticTokenPluginConfig::default());
        let parser: &dyn TokenParser = &service;

        match parser.parse("").await {
            Err(TokenParseError::Invalid(_)) => {}
            other => panic!("Expected Invalid, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn expired_identity_is_rejected_by_boundary() {
        let cfg = StaticTokenPluginConfig {
            mode: TokenMode::StaticTokens,
            tokens: vec![TokenMapping {
                token: "old".to_owned(),
                identity: IdentityConfig {
                    expires_at: Some(chrono::Utc::now() - chrono::Duration::hours(1)),
                    ..IdentityConfig::default()
                },
            }],
            ..StaticTokenPluginConfig::default()
        };
        let boundary = RequestBoundary::new(
            Arc::new(Service::from_config(&cfg)),
            SessionBoundaryConfig::default(),
        );

        let result = boundary
            .within(
                Credentials {
                    bearer_token: Some("old"),
                    tenant_header: None,
                },
                |_| async { SessionContext::has_session() },
            )
            .await;

        assert_eq!(result, Err(session_boundary::BoundaryRejection::Expired));
    }
}
