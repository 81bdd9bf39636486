//! Integration tests for identity changes.
//!
//! Runs a `Session` off the `LocalAuth` watch channel and checks that task
//! state never outlives the identity it was loaded for.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use taskdeck::auth::{Identity, LocalAuth};
use taskdeck::remote::memory::InMemoryRemote;
use taskdeck::remote::{RemoteError, RemoteTaskStore, UserScope};
use taskdeck::session::Session;
use taskdeck::tasks::{ErrorCallback, TaskState, TaskStore};
use taskdeck_proto::task::TaskDraft;

/// Waits until `f` holds for the store's state, failing after two seconds.
async fn wait_until(store: &TaskStore, f: impl FnMut(&TaskState) -> bool) {
    let mut rx = store.watch();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(f))
        .await
        .expect("timed out waiting for state")
        .expect("store dropped");
}

/// Seeds `uid`'s collection with tasks titled after `titles`.
async fn seed(remote: &InMemoryRemote, uid: &str, titles: &[&str]) {
    for title in titles {
        remote
            .create(&UserScope::new(uid), &TaskDraft::new(*title))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn run_follows_sign_in_switch_and_sign_out() {
    let remote = Arc::new(InMemoryRemote::default());
    let auth = LocalAuth::new();
    let alice = auth.sign_up("alice@example.com", "secret1").unwrap();
    let bob = auth.sign_up("bob@example.com", "secret2").unwrap();
    auth.sign_out();
    seed(&remote, &alice.uid, &["alice 1", "alice 2"]).await;
    seed(&remote, &bob.uid, &["bob 1"]).await;

    let session = Session::new(Arc::clone(&remote));
    let store = session.store().clone();
    let auth_rx = auth.subscribe();
    let driver = tokio::spawn(async move {
        let mut session = session;
        session.run(auth_rx).await;
        session
    });

    auth.sign_in("alice@example.com", "secret1").unwrap();
    wait_until(&store, |s| s.tasks.len() == 2).await;
    assert!(store.state().tasks.iter().all(|t| t.title.starts_with("alice")));

    auth.sign_in("bob@example.com", "secret2").unwrap();
    wait_until(&store, |s| {
        s.initialized && s.tasks.len() == 1 && s.tasks[0].title == "bob 1"
    })
    .await;

    auth.sign_out();
    wait_until(&store, |s| *s == TaskState::default()).await;

    // New writes for either identity never reach the signed-out state.
    seed(&remote, &alice.uid, &["alice 3"]).await;
    seed(&remote, &bob.uid, &["bob 2"]).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.state(), TaskState::default());

    drop(auth);
    let session = tokio::time::timeout(Duration::from_secs(2), driver)
        .await
        .expect("session did not stop")
        .unwrap();
    assert!(session.tasks().is_none());
    assert_eq!(remote.open_subscriptions(&UserScope::new(&alice.uid)), 0);
    assert_eq!(remote.open_subscriptions(&UserScope::new(&bob.uid)), 0);
}

#[tokio::test]
async fn restored_session_loads_without_sign_in() {
    let remote = Arc::new(InMemoryRemote::default());
    seed(&remote, "u-restored", &["from last time"]).await;

    let auth = LocalAuth::new();
    let mut session = Session::new(Arc::clone(&remote));
    session.apply_auth(&auth.current()).await;
    assert!(session.tasks().is_none());

    auth.restore(Some(Identity {
        uid: "u-restored".to_string(),
        email: None,
    }));
    session.apply_auth(&auth.current()).await;
    wait_until(session.store(), |s| s.tasks.len() == 1).await;
    assert!(session.is_subscribed());
}

#[tokio::test]
async fn late_results_for_previous_identity_are_dropped() {
    let remote = Arc::new(InMemoryRemote::default().with_latency(Duration::from_millis(40)));
    let mut session = Session::new(Arc::clone(&remote));
    let auth = LocalAuth::new();

    auth.restore(Some(Identity {
        uid: "alice".to_string(),
        email: None,
    }));
    session.apply_auth(&auth.current()).await;
    let alice_sync = session.tasks().cloned().unwrap();
    let pending = tokio::spawn(async move { alice_sync.create_task(TaskDraft::new("slow")).await });
    tokio::task::yield_now().await;

    auth.restore(Some(Identity {
        uid: "bob".to_string(),
        email: None,
    }));
    session.apply_auth(&auth.current()).await;

    let created = pending.await.unwrap().unwrap();
    wait_until(session.store(), |s| s.initialized).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let state = session.store().state();
    assert!(state.get(&created.id).is_none());
    assert!(state.tasks.is_empty());
}

#[tokio::test]
async fn subscription_errors_reach_session_callback() {
    let remote = Arc::new(InMemoryRemote::default());
    let errors = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&errors);
    let callback: ErrorCallback = Arc::new(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let mut session = Session::new(Arc::clone(&remote)).with_error_callback(callback);

    let auth = LocalAuth::new();
    auth.restore(Some(Identity {
        uid: "alice".to_string(),
        email: None,
    }));
    session.apply_auth(&auth.current()).await;
    wait_until(session.store(), |s| s.initialized).await;

    remote.inject_subscription_error(&UserScope::new("alice"), &RemoteError::PermissionDenied);
    wait_until(session.store(), |s| s.error.is_some()).await;
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}
