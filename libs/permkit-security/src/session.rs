//! Request-scoped session storage.
//!
//! Each inbound request runs inside its own [`SessionContext::scope`] (or
//! [`SessionContext::sync_scope`] for thread-per-request hosts). The scope
//! owns a private slot; `establish`/`current`/`clear` operate on the slot of
//! the request being executed, never on a shared global. The slot is dropped
//! with the scope, so the binding cannot outlive the request even when the
//! handler panics or its future is cancelled.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use crate::context::SessionInfo;

tokio::task_local! {
    static CURRENT: RefCell<Option<Arc<SessionInfo>>>;
}

/// Errors from binding a session.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// `establish` was called outside of any request scope.
    #[error("no request scope is active on this execution unit")]
    OutsideRequestScope,

    /// A session is already bound to this request.
    #[error("a session is already established for this request")]
    AlreadyEstablished,
}

/// Accessor for the session bound to the current request.
pub struct SessionContext;

impl SessionContext {
    /// Run `fut` as one request with its own, initially empty, session slot.
    pub async fn scope<F: Future>(fut: F) -> F::Output {
        CURRENT.scope(RefCell::new(None), fut).await
    }

    /// Synchronous counterpart of [`SessionContext::scope`].
    pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(RefCell::new(None), f)
    }

    /// Run `fut` in a new scope that carries the caller's current binding.
    ///
    /// Task-locals are not inherited by spawned tasks; wrap sub-work with this
    /// before `tokio::spawn` so it observes the same identity.
    pub fn propagate<F: Future>(fut: F) -> impl Future<Output = F::Output> {
        let inherited = Self::current();
        CURRENT.scope(RefCell::new(inherited), fut)
    }

    /// Bind `info` to the current request.
    ///
    /// # Errors
    ///
    /// - [`SessionError::OutsideRequestScope`] when no scope is active
    /// - [`SessionError::AlreadyEstablished`] when a session is already bound
    pub fn establish(info: SessionInfo) -> Result<(), SessionError> {
        CURRENT
            .try_with(|slot| {
                let mut slot = slot.borrow_mut();
                if slot.is_some() {
                    return Err(SessionError::AlreadyEstablished);
                }
                *slot = Some(Arc::new(info));
                Ok(())
            })
            .map_err(|_| SessionError::OutsideRequestScope)?
    }

    /// The session bound to the current request, if any.
    #[must_use]
    pub fn current() -> Option<Arc<SessionInfo>> {
        CURRENT.try_with(|slot| slot.borrow().clone()).ok().flatten()
    }

    /// Unbind the current session. A no-op outside of a scope.
    pub fn clear() {
        if CURRENT.try_with(|slot| slot.borrow_mut().take()).is_err() {
            tracing::trace!("session clear requested outside of a request scope");
        }
    }

    #[must_use]
    pub fn has_session() -> bool {
        Self::current().is_some()
    }

    #[must_use]
    pub fn user_id() -> Option<String> {
        Self::current().map(|s| s.user_id().to_owned())
    }

    #[must_use]
    pub fn tenant_id() -> Option<String> {
        Self::current().and_then(|s| s.tenant_id().map(ToOwned::to_owned))
    }

    #[must_use]
    pub fn abac_attribute(key: &str) -> Option<serde_json::Value> {
        Self::current().and_then(|s| s.abac_attributes().get(key).cloned())
    }
}
