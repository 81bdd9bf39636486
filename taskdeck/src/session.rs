//! Binds task state to whoever is signed in.
//!
//! A [`Session`] owns the [`TaskStore`] for the lifetime of the client and
//! rebuilds the sync side whenever the identity changes: the old
//! subscription goes first, then the state is reset, then the new identity
//! gets its own orchestrator and subscription.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::AuthState;
use crate::remote::{RemoteTaskStore, UserScope};
use crate::tasks::{ErrorCallback, Subscription, TaskAction, TaskStore, TaskSync};

/// Sync state for the identity currently signed in.
struct ActiveUser<R> {
    sync: TaskSync<R>,
    subscription: Option<Subscription>,
}

/// Owns task state across sign-ins.
pub struct Session<R> {
    remote: Arc<R>,
    store: TaskStore,
    active: Option<ActiveUser<R>>,
    on_error: Option<ErrorCallback>,
}

impl<R: RemoteTaskStore> Session<R> {
    /// Creates a signed-out session over `remote`.
    #[must_use]
    pub fn new(remote: Arc<R>) -> Self {
        Self {
            remote,
            store: TaskStore::new(),
            active: None,
            on_error: None,
        }
    }

    /// Passes subscription errors to `callback` as well as into state.
    #[must_use]
    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    /// The task state, signed in or not.
    #[must_use]
    pub const fn store(&self) -> &TaskStore {
        &self.store
    }

    /// The orchestrator for the signed-in identity.
    #[must_use]
    pub fn tasks(&self) -> Option<&TaskSync<R>> {
        self.active.as_ref().map(|active| &active.sync)
    }

    /// The signed-in identity's scope.
    #[must_use]
    pub fn scope(&self) -> Option<&UserScope> {
        self.tasks().map(TaskSync::scope)
    }

    /// Returns `true` while a live subscription is running.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.active
            .as_ref()
            .and_then(|active| active.subscription.as_ref())
            .is_some_and(Subscription::is_active)
    }

    /// Follows one auth state change.
    ///
    /// Does nothing while the provider is still initializing or when the
    /// identity is unchanged. Otherwise tears down the previous identity,
    /// resets the state, and subscribes for the new one.
    pub async fn apply_auth(&mut self, auth: &AuthState) {
        if auth.initializing {
            return;
        }
        let next = auth
            .identity
            .as_ref()
            .map(|identity| UserScope::new(identity.uid.clone()));
        if next.as_ref() == self.scope() {
            return;
        }

        tracing::info!(
            from = self.scope().map(UserScope::as_str),
            to = next.as_ref().map(UserScope::as_str),
            "identity changed"
        );
        self.close();
        self.store.dispatch(TaskAction::Reset);

        if let Some(scope) = next {
            let sync = TaskSync::new(Arc::clone(&self.remote), self.store.clone(), scope);
            // A failure to open is already recorded in state.
            let subscription = sync.subscribe_to_tasks(self.on_error.clone()).await.ok();
            self.active = Some(ActiveUser { sync, subscription });
        }
    }

    /// Applies auth changes from `auth_rx` until its sender goes away.
    pub async fn run(&mut self, mut auth_rx: watch::Receiver<AuthState>) {
        loop {
            let auth = auth_rx.borrow_and_update().clone();
            self.apply_auth(&auth).await;
            if auth_rx.changed().await.is_err() {
                break;
            }
        }
        tracing::debug!("auth channel closed, ending session");
        self.close();
    }

    /// Stops the current subscription and forgets the identity.
    ///
    /// Task state is left as it is.
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            if let Some(subscription) = active.subscription {
                subscription.unsubscribe();
            }
        }
    }
}
