//! Per-user task collections with snapshot fan-out.
//!
//! Documents are held postcard-encoded and decoded on every read, the
//! same way a remote document database hands back raw records. Each
//! mutation publishes the collection's new snapshot on a per-user
//! [`broadcast`] channel while the write lock is still held, so watchers
//! observe snapshots in mutation order.

use std::collections::HashMap;

use tokio::sync::{RwLock, broadcast};

use taskdeck_proto::codec::{self, CodecError};
use taskdeck_proto::task::{Task, TaskDocument, TaskDraft, TaskId, TaskUpdate, Timestamp};

/// Default number of snapshots buffered per watcher before it lags.
const DEFAULT_WATCH_CAPACITY: usize = 16;

/// Errors returned by [`DocumentStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No document with this id exists in the user's collection.
    #[error("document not found: {0}")]
    NotFound(TaskId),

    /// A stored document could not be encoded or decoded.
    #[error("document codec error: {0}")]
    Codec(#[from] CodecError),
}

/// One stored record: insertion sequence plus the encoded document.
#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    bytes: Vec<u8>,
}

/// All documents belonging to one user.
#[derive(Debug, Default)]
struct Collection {
    documents: HashMap<TaskId, StoredDocument>,
    next_seq: u64,
}

impl Collection {
    /// Decodes every document, newest first.
    ///
    /// Ordered by `created_at` descending; ties fall back to insertion
    /// order so that two tasks created within the same millisecond still
    /// list deterministically.
    fn snapshot(&self, read_at: Timestamp) -> Result<Vec<Task>, StoreError> {
        let mut rows = Vec::with_capacity(self.documents.len());
        for (id, stored) in &self.documents {
            let task = codec::decode_document(&stored.bytes)?.into_task(id.clone(), read_at);
            rows.push((stored.seq, task));
        }
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then_with(|| seq_b.cmp(seq_a))
        });
        Ok(rows.into_iter().map(|(_, task)| task).collect())
    }
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<String, Collection>,
    watchers: HashMap<String, broadcast::Sender<Vec<Task>>>,
}

impl Inner {
    /// Pushes the current snapshot of `uid` to its watchers, if any.
    fn publish(&self, uid: &str, now: Timestamp) -> Result<(), StoreError> {
        let Some(tx) = self.watchers.get(uid) else {
            return Ok(());
        };
        if tx.receiver_count() == 0 {
            return Ok(());
        }
        let snapshot = self
            .collections
            .get(uid)
            .map_or_else(|| Ok(Vec::new()), |c| c.snapshot(now))?;
        // Receivers may drop between the count check and the send.
        let _ = tx.send(snapshot);
        Ok(())
    }
}

/// In-memory, per-user document store.
///
/// Thread-safe via [`RwLock`]. Users never see each other's documents:
/// every operation is keyed by the caller's uid.
pub struct DocumentStore {
    inner: RwLock<Inner>,
    watch_capacity: usize,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    /// Creates an empty store with the default watcher buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_watch_capacity(DEFAULT_WATCH_CAPACITY)
    }

    /// Creates an empty store with a custom per-watcher snapshot buffer.
    #[must_use]
    pub fn with_watch_capacity(watch_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            watch_capacity: watch_capacity.max(1),
        }
    }

    /// Creates a task from a draft and returns it as the server now sees it.
    ///
    /// The id, `created_at`, and `updated_at` are assigned here.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if the document cannot be encoded.
    pub async fn add(&self, uid: &str, draft: &TaskDraft) -> Result<Task, StoreError> {
        let now = Timestamp::now();
        let id = TaskId::generate();
        let document = TaskDocument::from_draft(draft, now);
        let bytes = codec::encode_document(&document)?;

        let mut inner = self.inner.write().await;
        let collection = inner.collections.entry(uid.to_string()).or_default();
        let seq = collection.next_seq;
        collection.next_seq += 1;
        collection
            .documents
            .insert(id.clone(), StoredDocument { seq, bytes });
        inner.publish(uid, now)?;
        drop(inner);

        tracing::debug!(uid, task_id = %id, "document added");
        Ok(document.into_task(id, now))
    }

    /// Merges a partial update into an existing document.
    ///
    /// `updated_at` is set from the server clock; `completed_at` follows
    /// `completed` when it is part of the update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the document does not exist, or
    /// [`StoreError::Codec`] if it cannot be decoded or re-encoded.
    pub async fn patch(&self, uid: &str, id: &TaskId, update: &TaskUpdate) -> Result<(), StoreError> {
        let now = Timestamp::now();
        let mut inner = self.inner.write().await;
        let stored = inner
            .collections
            .get_mut(uid)
            .and_then(|c| c.documents.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let current = codec::decode_document(&stored.bytes)?.into_task(id.clone(), now);
        let next = update.apply_to(&current, now);
        stored.bytes = codec::encode_document(&TaskDocument::from(&next))?;
        inner.publish(uid, now)?;
        drop(inner);

        tracing::debug!(uid, task_id = %id, "document patched");
        Ok(())
    }

    /// Deletes a document. Deleting a missing document succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if the remaining documents cannot be
    /// decoded for the published snapshot.
    pub async fn remove(&self, uid: &str, id: &TaskId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let removed = inner
            .collections
            .get_mut(uid)
            .and_then(|c| c.documents.remove(id))
            .is_some();
        if removed {
            inner.publish(uid, Timestamp::now())?;
        }
        drop(inner);

        tracing::debug!(uid, task_id = %id, removed, "document removed");
        Ok(())
    }

    /// Returns every task for `uid`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if a stored document is corrupt.
    pub async fn list(&self, uid: &str) -> Result<Vec<Task>, StoreError> {
        let inner = self.inner.read().await;
        inner
            .collections
            .get(uid)
            .map_or_else(|| Ok(Vec::new()), |c| c.snapshot(Timestamp::now()))
    }

    /// Starts watching `uid`'s collection.
    ///
    /// Returns the current snapshot together with a receiver for every
    /// later one. Both are taken under the same lock, so no change can
    /// fall between them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if a stored document is corrupt.
    pub async fn watch(
        &self,
        uid: &str,
    ) -> Result<(Vec<Task>, broadcast::Receiver<Vec<Task>>), StoreError> {
        let mut inner = self.inner.write().await;
        let initial = inner
            .collections
            .get(uid)
            .map_or_else(|| Ok(Vec::new()), |c| c.snapshot(Timestamp::now()))?;
        let capacity = self.watch_capacity;
        let rx = inner
            .watchers
            .entry(uid.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe();
        drop(inner);

        tracing::debug!(uid, "watcher attached");
        Ok((initial, rx))
    }

    /// Returns the number of documents stored for `uid`.
    pub async fn len(&self, uid: &str) -> usize {
        let inner = self.inner.read().await;
        inner.collections.get(uid).map_or(0, |c| c.documents.len())
    }

    /// Returns `true` if `uid` has no documents.
    pub async fn is_empty(&self, uid: &str) -> bool {
        self.len(uid).await == 0
    }
}
