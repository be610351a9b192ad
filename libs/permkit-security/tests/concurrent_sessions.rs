#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use permkit_security::{SessionContext, SessionInfo};

fn session(user: &str, tenant: &str) -> SessionInfo {
    SessionInfo::builder().user_id(user).tenant_id(tenant).build()
}

/// Two requests interleave on a multi-threaded runtime; each must only ever
/// observe its own binding.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interleaved_requests_observe_only_their_own_session() {
    let request = |user: &'static str, tenant: &'static str| {
        tokio::spawn(SessionContext::scope(async move {
            SessionContext::establish(session(user, tenant)).unwrap();
            let mut seen = Vec::new();
            for _ in 0..20 {
                tokio::time::sleep(Duration::from_millis(1)).await;
                seen.push(SessionContext::user_id().unwrap());
                assert_eq!(SessionContext::tenant_id().as_deref(), Some(tenant));
            }
            SessionContext::clear();
            assert!(SessionContext::current().is_none());
            seen
        }))
    };

    let a = request("alice", "t1");
    let b = request("bob", "t2");

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert!(a.iter().all(|u| u == "alice"));
    assert!(b.iter().all(|u| u == "bob"));
}

#[tokio::test]
async fn cancelled_request_releases_binding() {
    let handle = tokio::spawn(SessionContext::scope(async {
        SessionContext::establish(session("u1", "t1")).unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    }));
    tokio::task::yield_now().await;
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    // The next request handled on this runtime starts with an empty slot.
    SessionContext::scope(async {
        assert!(SessionContext::current().is_none());
    })
    .await;
}

#[test]
fn panicking_handler_does_not_leak_into_next_request() {
    let result = std::panic::catch_unwind(|| {
        SessionContext::sync_scope(|| {
            SessionContext::establish(session("u1", "t1")).unwrap();
            panic!("handler failed");
        });
    });
    assert!(result.is_err());

    assert!(SessionContext::current().is_none());
    SessionContext::sync_scope(|| assert!(SessionContext::current().is_none()));
}
