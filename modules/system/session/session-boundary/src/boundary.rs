//! Per-request session lifecycle.
//!
//! [`RequestBoundary::within`] is the single place a session gets bound: it
//! opens a fresh [`SessionContext`] scope, admits the caller's credentials,
//! establishes the resulting session once and runs the handler. The scope is
//! dropped on every exit path, so nothing outlives the request.

use std::future::Future;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use permkit_security::{SessionContext, SessionInfo};

use crate::config::SessionBoundaryConfig;
use crate::token::{TokenParseError, TokenParser};

/// Log target for admission outcomes.
pub const BOUNDARY_LOG_TARGET: &str = "session_boundary::admission";

/// Credentials extracted from one inbound request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    /// Value after `Bearer ` in the `Authorization` header.
    pub bearer_token: Option<&'a str>,
    /// Value of the configured tenant header.
    pub tenant_header: Option<&'a str>,
}

/// Why the boundary refused a request.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum BoundaryRejection {
    #[error("authentication required")]
    Unauthenticated,

    #[error("session expired")]
    Expired,

    #[error("tenant header does not match the authenticated tenant")]
    TenantMismatch,

    #[error("authentication service unavailable")]
    ServiceUnavailable,
}

impl BoundaryRejection {
    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::Expired => StatusCode::UNAUTHORIZED,
            Self::TenantMismatch => StatusCode::FORBIDDEN,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Unauthenticated | Self::Expired => "Unauthorized",
            Self::TenantMismatch => "Forbidden",
            Self::ServiceUnavailable => "Service Unavailable",
        }
    }
}

/// RFC-9457 Problem Details body.
impl IntoResponse for BoundaryRejection {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "type": "about:blank",
            "title": self.title(),
            "status": status.as_u16(),
            "detail": self.to_string(),
        });
        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/problem+json")],
            axum::Json(body),
        )
            .into_response()
    }
}

/// Derives and binds the session for each inbound request.
pub struct RequestBoundary {
    parser: Arc<dyn TokenParser>,
    config: SessionBoundaryConfig,
}

impl RequestBoundary {
    #[must_use]
    pub fn new(parser: Arc<dyn TokenParser>, config: SessionBoundaryConfig) -> Self {
        Self { parser, config }
    }

    #[must_use]
    pub fn config(&self) -> &SessionBoundaryConfig {
        &self.config
    }

    /// Decide whether the request runs with a session, anonymously, or not
    /// at all.
    ///
    /// `Ok(None)` means anonymous and only occurs when `require_auth` is off.
    ///
    /// # Errors
    ///
    /// Returns a [`BoundaryRejection`] when `require_auth` is on and no
    /// acceptable session can be derived.
    pub async fn admit(
        &self,
        credentials: Credentials<'_>,
    ) -> Result<Option<SessionInfo>, BoundaryRejection> {
        match self.derive(credentials).await {
            Ok(info) => Ok(Some(info)),
            Err(rejection) if self.config.require_auth => {
                tracing::debug!(
                    target: BOUNDARY_LOG_TARGET,
                    reason = %rejection,
                    "request rejected"
                );
                Err(rejection)
            }
            Err(rejection) => {
                tracing::debug!(
                    target: BOUNDARY_LOG_TARGET,
                    reason = %rejection,
                    "continuing anonymously"
                );
                Ok(None)
            }
        }
    }

    async fn derive(&self, credentials: Credentials<'_>) -> Result<SessionInfo, BoundaryRejection> {
        let token = credentials
            .bearer_token
            .filter(|t| !t.is_empty())
            .ok_or(BoundaryRejection::Unauthenticated)?;

        let info = self.parser.parse(token).await.map_err(|err| match err {
            TokenParseError::Invalid(_) => BoundaryRejection::Unauthenticated,
            TokenParseError::Expired => BoundaryRejection::Expired,
            TokenParseError::Unavailable(reason) => {
                tracing::error!(target: BOUNDARY_LOG_TARGET, %reason, "token parser unavailable");
                BoundaryRejection::ServiceUnavailable
            }
        })?;

        if self.config.reject_expired && info.is_expired(chrono::Utc::now()) {
            return Err(BoundaryRejection::Expired);
        }

        if let Some(requested) = credentials.tenant_header
            && info.tenant_id() != Some(requested)
        {
            tracing::warn!(
                target: BOUNDARY_LOG_TARGET,
                user_id = info.user_id(),
                "tenant header mismatch"
            );
            return Err(BoundaryRejection::TenantMismatch);
        }

        Ok(info)
    }

    /// Run `handler` as one request.
    ///
    /// The handler receives the bound session (or `None` when anonymous) and
    /// also sees it through [`SessionContext::current`] for its whole
    /// duration, including after `.await` points.
    ///
    /// # Errors
    ///
    /// Returns the [`BoundaryRejection`] from [`Self::admit`]; the handler is
    /// not run in that case.
    pub async fn within<F, Fut>(
        &self,
        credentials: Credentials<'_>,
        handler: F,
    ) -> Result<Fut::Output, BoundaryRejection>
    where
        F: FnOnce(Option<Arc<SessionInfo>>) -> Fut,
        Fut: Future,
    {
        SessionContext::scope(async move {
            let session = self.admit(credentials).await?;
            if let Some(info) = session
                && let Err(err) = SessionContext::establish(info)
            {
                tracing::error!(target: BOUNDARY_LOG_TARGET, error = %err, "failed to bind session");
                return Err(BoundaryRejection::ServiceUnavailable);
            }

            let output = handler(SessionContext::current()).await;
            SessionContext::clear();
            Ok(output)
        })
        .await
    }
}

impl std::fmt::Debug for RequestBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBoundary")
            .field("parser", &"<dyn TokenParser>")
            .field("config", &self.config)
            .finish()
    }
}
