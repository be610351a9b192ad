//! axum integration for [`RequestBoundary`].

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use permkit_security::SessionInfo;

use crate::boundary::{Credentials, RequestBoundary};

/// Session middleware.
///
/// For each request:
/// 1. Skips CORS preflight requests
/// 2. Extracts the bearer token and tenant header
/// 3. Admits the credentials through the [`RequestBoundary`]
/// 4. Runs the rest of the stack inside the request scope, with the
///    [`SessionInfo`] also inserted into request extensions
///
/// ```ignore
/// let app = Router::new()
///     .route("/orders", get(list_orders))
///     .layer(axum::middleware::from_fn_with_state(boundary, session_middleware));
/// ```
pub async fn session_middleware(
    State(boundary): State<Arc<RequestBoundary>>,
    mut req: Request,
    next: Next,
) -> Response {
    if is_preflight_request(req.method(), req.headers()) {
        return next.run(req).await;
    }

    let bearer_token = extract_bearer_token(req.headers()).map(ToOwned::to_owned);
    let tenant_header = req
        .headers()
        .get(boundary.config().tenant_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    let credentials = Credentials {
        bearer_token: bearer_token.as_deref(),
        tenant_header: tenant_header.as_deref(),
    };

    let outcome = boundary
        .within(credentials, |session| async move {
            if let Some(info) = session {
                req.extensions_mut().insert(SessionInfo::clone(&info));
            }
            next.run(req).await
        })
        .await;

    outcome.unwrap_or_else(IntoResponse::into_response)
}

/// Extract Bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").map(str::trim))
}

/// Preflight requests are OPTIONS requests carrying both `Origin` and
/// `Access-Control-Request-Method`.
fn is_preflight_request(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::OPTIONS
        && headers.contains_key(axum::http::header::ORIGIN)
        && headers.contains_key(axum::http::header::ACCESS_CONTROL_REQUEST_METHOD)
}
