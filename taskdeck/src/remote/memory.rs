//! In-process remote backed by [`DocumentStore`].
//!
//! Adds the things a test needs on top of the plain store: simulated
//! round-trip latency, queued failures for the next calls, and injected
//! errors on open subscriptions.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use taskdeck_proto::task::{Task, TaskDraft, TaskId, TaskUpdate};
use taskdeck_store::{DocumentStore, StoreError};

use super::{RemoteError, RemoteTaskStore, SnapshotEvent, SnapshotReceiver, UserScope};

/// Default number of snapshots buffered per subscription.
const DEFAULT_SUBSCRIPTION_BUFFER: usize = 16;

impl From<StoreError> for RemoteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Codec(e) => Self::Corrupt(e.to_string()),
        }
    }
}

/// [`RemoteTaskStore`] over a shared in-process [`DocumentStore`].
///
/// Several remotes may share one store to model several devices signed
/// in to the same backend.
pub struct InMemoryRemote {
    store: Arc<DocumentStore>,
    latency: Duration,
    subscription_buffer: usize,
    /// Failures handed out, one per call, before touching the store.
    failures: Mutex<VecDeque<RemoteError>>,
    /// Open subscription senders per scope, kept for error injection.
    subscribers: Mutex<HashMap<UserScope, Vec<mpsc::Sender<SnapshotEvent>>>>,
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new(Arc::new(DocumentStore::new()))
    }
}

impl InMemoryRemote {
    /// Creates a remote over `store` with no latency.
    #[must_use]
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self {
            store,
            latency: Duration::ZERO,
            subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER,
            failures: Mutex::new(VecDeque::new()),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Sets the per-subscription snapshot buffer.
    #[must_use]
    pub fn with_subscription_buffer(mut self, buffer: usize) -> Self {
        self.subscription_buffer = buffer.max(1);
        self
    }

    /// Returns the underlying document store.
    #[must_use]
    pub const fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Makes the next call fail with `err`. Calls queue up in order.
    pub fn fail_next(&self, err: RemoteError) {
        self.failures.lock().push_back(err);
    }

    /// Pushes `err` onto every open subscription for `scope`.
    ///
    /// Returns how many subscriptions received it.
    pub fn inject_subscription_error(&self, scope: &UserScope, err: &RemoteError) -> usize {
        let mut subscribers = self.subscribers.lock();
        let Some(senders) = subscribers.get_mut(scope) else {
            return 0;
        };
        senders.retain(|tx| !tx.is_closed());
        senders
            .iter()
            .filter(|tx| tx.try_send(Err(err.clone())).is_ok())
            .count()
    }

    /// Number of subscriptions for `scope` whose receiver is still alive.
    #[must_use]
    pub fn open_subscriptions(&self, scope: &UserScope) -> usize {
        self.subscribers
            .lock()
            .get(scope)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }

    /// Waits out the simulated latency, then hands out a queued failure if any.
    async fn round_trip(&self) -> Result<(), RemoteError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let failure = self.failures.lock().pop_front();
        failure.map_or(Ok(()), Err)
    }
}

impl RemoteTaskStore for InMemoryRemote {
    async fn create(&self, scope: &UserScope, draft: &TaskDraft) -> Result<Task, RemoteError> {
        self.round_trip().await?;
        Ok(self.store.add(scope.as_str(), draft).await?)
    }

    async fn update(
        &self,
        scope: &UserScope,
        id: &TaskId,
        update: &TaskUpdate,
    ) -> Result<(), RemoteError> {
        self.round_trip().await?;
        Ok(self.store.patch(scope.as_str(), id, update).await?)
    }

    async fn delete(&self, scope: &UserScope, id: &TaskId) -> Result<(), RemoteError> {
        self.round_trip().await?;
        Ok(self.store.remove(scope.as_str(), id).await?)
    }

    async fn fetch_all(&self, scope: &UserScope) -> Result<Vec<Task>, RemoteError> {
        self.round_trip().await?;
        Ok(self.store.list(scope.as_str()).await?)
    }

    async fn subscribe(&self, scope: &UserScope) -> Result<SnapshotReceiver, RemoteError> {
        self.round_trip().await?;
        let (initial, watch_rx) = self.store.watch(scope.as_str()).await?;
        let (tx, rx) = mpsc::channel(self.subscription_buffer);
        {
            let mut subscribers = self.subscribers.lock();
            let senders = subscribers.entry(scope.clone()).or_default();
            senders.retain(|sender| !sender.is_closed());
            senders.push(tx.clone());
        }

        tokio::spawn(forward_snapshots(
            Arc::clone(&self.store),
            scope.clone(),
            initial,
            watch_rx,
            tx,
        ));
        Ok(rx)
    }
}

/// Pumps store snapshots into one subscriber until either side goes away.
async fn forward_snapshots(
    store: Arc<DocumentStore>,
    scope: UserScope,
    initial: Vec<Task>,
    mut watch_rx: broadcast::Receiver<Vec<Task>>,
    tx: mpsc::Sender<SnapshotEvent>,
) {
    if tx.send(Ok(initial)).await.is_err() {
        return;
    }
    loop {
        tokio::select! {
            () = tx.closed() => break,
            received = watch_rx.recv() => {
                let event = match received {
                    Ok(snapshot) => Ok(snapshot),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Intermediate snapshots are lost; re-read the latest state.
                        tracing::debug!(scope = %scope, skipped, "subscriber lagged, re-listing");
                        store.list(scope.as_str()).await.map_err(RemoteError::from)
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = tx.send(Err(RemoteError::Closed)).await;
                        break;
                    }
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        }
    }
    tracing::debug!(scope = %scope, "snapshot forwarding stopped");
}
