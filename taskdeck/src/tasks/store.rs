//! The single mutable home of [`TaskState`].
//!
//! State lives in a [`watch`] channel: every [`TaskStore::dispatch`] runs
//! the reducer under the channel's lock and wakes all watchers, so a
//! reader never sees a half-applied action.
//!
//! Each [`TaskAction::Reset`] starts a new generation. Work begun for an
//! earlier identity dispatches through [`TaskStore::dispatch_for`], which
//! drops the action once the generation has moved on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::watch;

use super::reducer::{TaskAction, TaskState, reduce};

/// Cloneable handle to one session's task state.
///
/// All clones share the same state. Writes go exclusively through
/// [`dispatch`](Self::dispatch).
#[derive(Clone)]
pub struct TaskStore {
    tx: Arc<watch::Sender<TaskState>>,
    generation: Arc<AtomicU64>,
    in_flight: Arc<AtomicUsize>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    /// Creates a store holding the initial state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(TaskState::default())),
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Applies an action and notifies watchers.
    pub fn dispatch(&self, action: TaskAction) {
        let origin = action.origin();
        let name = action.name();
        self.tx.send_modify(|state| self.apply(state, action));
        tracing::debug!(action = name, %origin, "task action dispatched");
    }

    /// Applies an action only if no reset happened since `generation`.
    ///
    /// The check and the write happen under the same lock as
    /// [`dispatch`](Self::dispatch), so a late result for a previous
    /// identity can never land after the reset that discarded it.
    /// Returns whether the action was applied.
    pub fn dispatch_for(&self, generation: u64, action: TaskAction) -> bool {
        let origin = action.origin();
        let name = action.name();
        let applied = self.tx.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            self.apply(state, action);
            true
        });
        if applied {
            tracing::debug!(action = name, %origin, generation, "task action dispatched");
        } else {
            tracing::debug!(action = name, %origin, generation, "stale task action dropped");
        }
        applied
    }

    /// Returns the current generation, bumped by every reset.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Runs the reducer in place. Callers hold the channel's write lock.
    fn apply(&self, state: &mut TaskState, action: TaskAction) {
        if matches!(action, TaskAction::Reset) {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        let next = reduce(state, action);
        *state = next;
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.tx.borrow().clone()
    }

    /// Runs `f` against the current state without cloning it.
    pub fn read<T>(&self, f: impl FnOnce(&TaskState) -> T) -> T {
        f(&self.tx.borrow())
    }

    /// Returns a receiver that is woken after every dispatch.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<TaskState> {
        self.tx.subscribe()
    }

    /// Marks a round-trip as outstanding until the guard is dropped.
    ///
    /// `loading` stays true while any guard is alive and is cleared when
    /// the last one goes, whichever way the operation ends.
    #[must_use = "loading is cleared as soon as the guard is dropped"]
    pub fn begin_loading(&self) -> LoadingGuard {
        self.tx.send_modify(|state| {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            self.apply(state, TaskAction::SetLoading(true));
        });
        tracing::debug!(action = "SetLoading", "round-trip started");
        LoadingGuard {
            store: self.clone(),
        }
    }

    /// Ends one round-trip; the last one out clears `loading`.
    ///
    /// The counter moves under the channel's lock, so a guard taken
    /// concurrently can never have its `loading` overwritten.
    fn end_loading(&self) {
        let cleared = self.tx.send_if_modified(|state| {
            if self.in_flight.fetch_sub(1, Ordering::SeqCst) != 1 {
                return false;
            }
            self.apply(state, TaskAction::SetLoading(false));
            true
        });
        if cleared {
            tracing::debug!(action = "SetLoading", "last round-trip finished");
        }
    }
}

/// Keeps `loading` set for the duration of one remote round-trip.
pub struct LoadingGuard {
    store: TaskStore,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.store.end_loading();
    }
}
