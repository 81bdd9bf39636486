//! Integration tests for task synchronization.
//!
//! Drives `TaskSync` against the in-process remote: the create, complete,
//! delete round trip, snapshots from a second device, and how failures
//! leave the last known list in place.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use taskdeck::remote::memory::InMemoryRemote;
use taskdeck::remote::{RemoteError, RemoteTaskStore, UserScope};
use taskdeck::tasks::{SyncError, TaskState, TaskStore, TaskSync};
use taskdeck_proto::task::{TaskDraft, TaskUpdate};
use taskdeck_store::DocumentStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A `TaskSync` for `uid` over `remote` with a fresh store.
fn make_sync(remote: &Arc<InMemoryRemote>, uid: &str) -> TaskSync<InMemoryRemote> {
    TaskSync::new(Arc::clone(remote), TaskStore::new(), UserScope::new(uid))
}

/// Waits until `f` holds for the store's state, failing after two seconds.
async fn wait_until(store: &TaskStore, f: impl FnMut(&TaskState) -> bool) {
    let mut rx = store.watch();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(f))
        .await
        .expect("timed out waiting for state")
        .expect("store dropped");
}

// ---------------------------------------------------------------------------
// Create -> complete -> delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_complete_delete_round_trip() {
    let remote = Arc::new(InMemoryRemote::default());
    let sync = make_sync(&remote, "alice");
    sync.create_task(TaskDraft::new("Existing")).await.unwrap();

    let created = sync.create_task(TaskDraft::new("Test")).await.unwrap();
    let state = sync.store().state();
    assert_eq!(state.tasks[0].id, created.id);
    assert!(!created.completed);
    assert_eq!(created.completed_at, None);
    assert_eq!(created.description, "");
    assert!(created.created_at.as_millis() > 0);
    assert!(created.updated_at >= created.created_at);

    let completed = sync
        .update_task(&created.id, TaskUpdate::completed(true))
        .await
        .unwrap()
        .expect("task is held locally");
    assert!(completed.completed);
    assert!(completed.completed_at.is_some());
    let state = sync.store().state();
    assert_eq!(state.position(&created.id), Some(0));
    assert_eq!(state.tasks.len(), 2);

    sync.delete_task(&created.id).await.unwrap();
    let state = sync.store().state();
    assert!(state.get(&created.id).is_none());
    assert_eq!(state.tasks.len(), 1);
    assert!(!state.loading);
    assert_eq!(state.error, None);

    let stored = remote.fetch_all(sync.scope()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Existing");
}

#[tokio::test]
async fn reopening_clears_completed_at() {
    let remote = Arc::new(InMemoryRemote::default());
    let sync = make_sync(&remote, "alice");
    let task = sync.create_task(TaskDraft::new("Toggle")).await.unwrap();

    sync.update_task(&task.id, TaskUpdate::completed(true))
        .await
        .unwrap();
    let reopened = sync
        .update_task(&task.id, TaskUpdate::completed(false))
        .await
        .unwrap()
        .unwrap();
    assert!(!reopened.completed);
    assert_eq!(reopened.completed_at, None);

    let stored = remote.fetch_all(sync.scope()).await.unwrap();
    assert_eq!(stored[0].completed_at, None);
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_device_sees_changes_through_snapshots() {
    let shared = Arc::new(DocumentStore::new());
    let phone = Arc::new(InMemoryRemote::new(Arc::clone(&shared)));
    let laptop = Arc::new(InMemoryRemote::new(Arc::clone(&shared)));

    let phone_sync = make_sync(&phone, "alice");
    let laptop_sync = make_sync(&laptop, "alice");
    let _subscription = laptop_sync.subscribe_to_tasks(None).await.unwrap();
    wait_until(laptop_sync.store(), |s| s.initialized).await;

    let task = phone_sync
        .create_task(TaskDraft::new("Buy milk"))
        .await
        .unwrap();
    wait_until(laptop_sync.store(), |s| s.get(&task.id).is_some()).await;

    phone_sync
        .update_task(&task.id, TaskUpdate::completed(true))
        .await
        .unwrap();
    wait_until(laptop_sync.store(), |s| {
        s.get(&task.id).is_some_and(|t| t.completed)
    })
    .await;

    phone_sync.delete_task(&task.id).await.unwrap();
    wait_until(laptop_sync.store(), |s| s.tasks.is_empty()).await;
}

#[tokio::test]
async fn snapshot_replaces_local_merge() {
    let remote = Arc::new(InMemoryRemote::default());
    let sync = make_sync(&remote, "alice");
    let _subscription = sync.subscribe_to_tasks(None).await.unwrap();
    wait_until(sync.store(), |s| s.initialized).await;

    let task = sync.create_task(TaskDraft::new("Call mom")).await.unwrap();
    sync.update_task(&task.id, TaskUpdate::title("Call mom back"))
        .await
        .unwrap();

    let authoritative = remote.fetch_all(sync.scope()).await.unwrap();
    wait_until(sync.store(), |s| s.tasks == authoritative).await;
    assert_eq!(sync.store().state().tasks[0].title, "Call mom back");
}

#[tokio::test]
async fn identities_do_not_see_each_other() {
    let remote = Arc::new(InMemoryRemote::default());
    let alice = make_sync(&remote, "alice");
    let bob = make_sync(&remote, "bob");
    let _bob_subscription = bob.subscribe_to_tasks(None).await.unwrap();
    wait_until(bob.store(), |s| s.initialized).await;

    alice.create_task(TaskDraft::new("private")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(bob.store().state().tasks.is_empty());
    assert!(bob.fetch_tasks().await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_fetch_keeps_last_known_list() {
    let remote = Arc::new(InMemoryRemote::default());
    let sync = make_sync(&remote, "alice");
    sync.create_task(TaskDraft::new("kept")).await.unwrap();
    sync.fetch_tasks().await.unwrap();

    remote.fail_next(RemoteError::Unavailable("offline".to_string()));
    let err = sync.fetch_tasks().await.unwrap_err();
    assert!(matches!(err, SyncError::Remote(RemoteError::Unavailable(_))));

    let state = sync.store().state();
    assert_eq!(state.tasks.len(), 1);
    assert!(state.error.is_some());
    assert!(state.initialized);
    assert!(!state.loading);
}

#[tokio::test]
async fn subscription_error_keeps_list_and_recovers() {
    let remote = Arc::new(InMemoryRemote::default());
    let sync = make_sync(&remote, "alice");
    let _subscription = sync.subscribe_to_tasks(None).await.unwrap();
    sync.create_task(TaskDraft::new("visible")).await.unwrap();
    wait_until(sync.store(), |s| s.initialized && s.tasks.len() == 1).await;

    remote.inject_subscription_error(sync.scope(), &RemoteError::PermissionDenied);
    wait_until(sync.store(), |s| s.error.is_some()).await;
    assert_eq!(sync.store().state().tasks.len(), 1);

    // The next snapshot clears the error again.
    sync.create_task(TaskDraft::new("second")).await.unwrap();
    wait_until(sync.store(), |s| s.error.is_none() && s.tasks.len() == 2).await;
}

#[tokio::test]
async fn failed_create_keeps_draft_for_retry() {
    let remote = Arc::new(InMemoryRemote::default());
    let sync = make_sync(&remote, "alice");
    let draft = TaskDraft::new("Retry me").with_description("soon");

    remote.fail_next(RemoteError::Unavailable("offline".to_string()));
    assert!(sync.create_task(draft.clone()).await.is_err());
    assert!(sync.store().state().tasks.is_empty());

    sync.clear_error();
    let task = sync.create_task(draft).await.unwrap();
    assert_eq!(task.description, "soon");
    assert_eq!(sync.store().state().error, None);
}

#[tokio::test]
async fn loading_stays_set_across_overlapping_calls() {
    let remote = Arc::new(InMemoryRemote::default().with_latency(Duration::from_millis(30)));
    let sync = make_sync(&remote, "alice");

    let (a, b) = tokio::join!(
        sync.create_task(TaskDraft::new("one")),
        sync.create_task(TaskDraft::new("two")),
    );
    a.unwrap();
    b.unwrap();
    let state = sync.store().state();
    assert_eq!(state.tasks.len(), 2);
    assert!(!state.loading);
}
