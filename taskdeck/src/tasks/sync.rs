//! Remote round-trips for one identity's task collection.
//!
//! `TaskSync` is the only writer that talks to the remote store. Every
//! mutation waits for the store to accept it and then dispatches the
//! confirmed result; the live subscription replaces the whole list on
//! every snapshot. All of its dispatches are tied to the store generation
//! it was created in, so nothing it does survives a reset.

use std::sync::Arc;

use tokio::task::JoinHandle;

use taskdeck_proto::task::{Task, TaskDraft, TaskId, TaskUpdate, Timestamp};
use taskdeck_proto::validation::{normalize_description, title_or_untitled};

use super::reducer::TaskAction;
use super::store::TaskStore;
use super::{SyncError, to_error_message};
use crate::remote::{RemoteError, RemoteTaskStore, SnapshotReceiver, UserScope};

/// Called for every error the live subscription reports.
pub type ErrorCallback = Arc<dyn Fn(&SyncError) + Send + Sync>;

/// Orchestrates remote calls for one [`UserScope`] against one [`TaskStore`].
pub struct TaskSync<R> {
    remote: Arc<R>,
    store: TaskStore,
    scope: UserScope,
    generation: u64,
}

impl<R> Clone for TaskSync<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            store: self.store.clone(),
            scope: self.scope.clone(),
            generation: self.generation,
        }
    }
}

impl<R: RemoteTaskStore> TaskSync<R> {
    /// Binds a remote and a store to `scope` at the store's current generation.
    #[must_use]
    pub fn new(remote: Arc<R>, store: TaskStore, scope: UserScope) -> Self {
        let generation = store.generation();
        Self {
            remote,
            store,
            scope,
            generation,
        }
    }

    /// The identity this orchestrator works for.
    #[must_use]
    pub const fn scope(&self) -> &UserScope {
        &self.scope
    }

    /// The store this orchestrator writes to.
    #[must_use]
    pub const fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Returns `false` once the store has been reset past this orchestrator.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.store.generation() == self.generation
    }

    /// Creates a task and adds the stored result to the list.
    ///
    /// The title falls back to a placeholder when blank; title and
    /// description are whitespace-normalized before they leave the client.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Remote`] if the store rejects the write. The
    /// message is also recorded in state.
    pub async fn create_task(&self, draft: TaskDraft) -> Result<Task, SyncError> {
        let _loading = self.store.begin_loading();
        let draft = TaskDraft {
            title: title_or_untitled(&draft.title),
            description: draft.description.as_deref().map(normalize_description),
            ..draft
        };
        match self.remote.create(&self.scope, &draft).await {
            Ok(task) => {
                tracing::debug!(scope = %self.scope, task_id = %task.id, "task created");
                self.store
                    .dispatch_for(self.generation, TaskAction::AddTask(task.clone()));
                Ok(task)
            }
            Err(err) => Err(self.surface("create", err)),
        }
    }

    /// Sends `update` for `id` and merges it into the local copy.
    ///
    /// Returns the merged task, or `None` when the task is no longer in
    /// local state (for example because a snapshot already removed it).
    /// The merge uses the local clock; the next snapshot carries the
    /// store's own timestamps and replaces it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Remote`] if the store rejects the write.
    pub async fn update_task(
        &self,
        id: &TaskId,
        update: TaskUpdate,
    ) -> Result<Option<Task>, SyncError> {
        let _loading = self.store.begin_loading();
        let update = normalize_update(update);
        if let Err(err) = self.remote.update(&self.scope, id, &update).await {
            return Err(self.surface("update", err));
        }

        let now = Timestamp::now();
        let merged = self
            .store
            .read(|state| state.get(id).map(|task| update.apply_to(task, now)));
        match &merged {
            Some(task) => {
                tracing::debug!(scope = %self.scope, task_id = %id, "task updated");
                self.store
                    .dispatch_for(self.generation, TaskAction::UpdateTask(task.clone()));
            }
            None => tracing::debug!(scope = %self.scope, task_id = %id, "updated task not held locally"),
        }
        Ok(merged)
    }

    /// Deletes a task and drops it from the list.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Remote`] if the store rejects the delete.
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), SyncError> {
        let _loading = self.store.begin_loading();
        if let Err(err) = self.remote.delete(&self.scope, id).await {
            return Err(self.surface("delete", err));
        }
        tracing::debug!(scope = %self.scope, task_id = %id, "task deleted");
        self.store
            .dispatch_for(self.generation, TaskAction::DeleteTask(id.clone()));
        Ok(())
    }

    /// Loads the whole collection once and replaces the list with it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Remote`] if the read fails. The state is then
    /// marked initialized with the error set, so the UI stops waiting.
    pub async fn fetch_tasks(&self) -> Result<Vec<Task>, SyncError> {
        let _loading = self.store.begin_loading();
        match self.remote.fetch_all(&self.scope).await {
            Ok(tasks) => {
                tracing::debug!(scope = %self.scope, count = tasks.len(), "tasks fetched");
                self.store
                    .dispatch_for(self.generation, TaskAction::SetTasks(tasks.clone()));
                Ok(tasks)
            }
            Err(err) => Err(self.surface("fetch", err)),
        }
    }

    /// Opens the live subscription and starts applying its snapshots.
    ///
    /// Each snapshot replaces the list. Each error is recorded in state and
    /// passed to `on_error`; the subscription stays open until the store
    /// ends it or the returned handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Subscription`] if the subscription cannot be
    /// opened. `on_error` is called with it as well.
    pub async fn subscribe_to_tasks(
        &self,
        on_error: Option<ErrorCallback>,
    ) -> Result<Subscription, SyncError> {
        let rx = match self.remote.subscribe(&self.scope).await {
            Ok(rx) => rx,
            Err(err) => {
                let err = SyncError::Subscription(err);
                tracing::warn!(scope = %self.scope, error = %err, "task subscription failed to open");
                self.store.dispatch_for(
                    self.generation,
                    TaskAction::SetError(Some(to_error_message(&err))),
                );
                if let Some(callback) = &on_error {
                    callback(&err);
                }
                return Err(err);
            }
        };

        tracing::info!(scope = %self.scope, generation = self.generation, "task subscription opened");
        let handle = tokio::spawn(forward_snapshots(
            self.store.clone(),
            self.generation,
            self.scope.clone(),
            rx,
            on_error,
        ));
        Ok(Subscription {
            handle,
            scope: self.scope.clone(),
        })
    }

    /// Clears the recorded error.
    pub fn clear_error(&self) {
        self.store
            .dispatch_for(self.generation, TaskAction::SetError(None));
    }

    /// Records a failed round-trip in state and hands the error back.
    fn surface(&self, operation: &'static str, err: RemoteError) -> SyncError {
        let err = SyncError::Remote(err);
        tracing::warn!(scope = %self.scope, operation, error = %err, "remote task operation failed");
        self.store.dispatch_for(
            self.generation,
            TaskAction::SetError(Some(to_error_message(&err))),
        );
        err
    }
}

/// Normalizes the free-text fields of an update the same way create does.
fn normalize_update(update: TaskUpdate) -> TaskUpdate {
    TaskUpdate {
        title: update.title.as_deref().map(title_or_untitled),
        description: update.description.as_deref().map(normalize_description),
        ..update
    }
}

/// Applies subscription events until the stream ends or the store moves on.
async fn forward_snapshots(
    store: TaskStore,
    generation: u64,
    scope: UserScope,
    mut rx: SnapshotReceiver,
    on_error: Option<ErrorCallback>,
) {
    while let Some(event) = rx.recv().await {
        let applied = match event {
            Ok(tasks) => {
                tracing::debug!(scope = %scope, count = tasks.len(), "task snapshot received");
                store.dispatch_for(generation, TaskAction::SetTasks(tasks))
            }
            Err(err) => {
                let err = SyncError::Remote(err);
                tracing::warn!(scope = %scope, error = %err, "task subscription error");
                let applied = store.dispatch_for(
                    generation,
                    TaskAction::SetError(Some(to_error_message(&err))),
                );
                if applied {
                    if let Some(callback) = &on_error {
                        callback(&err);
                    }
                }
                applied
            }
        };
        if !applied {
            tracing::debug!(scope = %scope, generation, "task store was reset, stopping subscription");
            break;
        }
    }
    tracing::info!(scope = %scope, "task subscription closed");
}

/// Handle to a running task subscription.
///
/// Dropping the handle stops the subscription; [`unsubscribe`](Self::unsubscribe)
/// does the same explicitly. Both consume the handle, so teardown happens
/// exactly once.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
    scope: UserScope,
}

impl Subscription {
    /// Stops applying snapshots.
    pub fn unsubscribe(self) {
        tracing::debug!(scope = %self.scope, "unsubscribing from tasks");
        drop(self);
    }

    /// The identity this subscription belongs to.
    #[must_use]
    pub const fn scope(&self) -> &UserScope {
        &self.scope
    }

    /// Returns `false` once the stream has ended on its own.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
