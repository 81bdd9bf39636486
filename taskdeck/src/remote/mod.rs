//! Remote task store abstraction.
//!
//! Defines the [`RemoteTaskStore`] trait the sync layer talks to.
//! Concrete implementations:
//! - [`memory::InMemoryRemote`]: in-process document store with fault
//!   injection, used by tests and the demo binary

pub mod memory;

use std::fmt;

use tokio::sync::mpsc;

use taskdeck_proto::task::{Task, TaskDraft, TaskId, TaskUpdate};

/// The authenticated identity under which tasks are namespaced.
///
/// Every remote call carries one; a store never returns or touches
/// tasks outside the given scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserScope(String);

impl UserScope {
    /// Creates a scope from an identity's uid.
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Returns the uid.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur during remote store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The addressed task does not exist in this scope.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The caller is not allowed to access this scope.
    #[error("permission denied")]
    PermissionDenied,

    /// The store could not be reached.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// A stored task could not be read.
    #[error("stored task is unreadable: {0}")]
    Corrupt(String),

    /// The snapshot stream ended on the store side.
    #[error("task subscription closed")]
    Closed,

    /// Any other failure, carrying whatever message the store gave.
    #[error("{0}")]
    Other(String),
}

/// One item on a snapshot stream: a full listing or a stream error.
pub type SnapshotEvent = Result<Vec<Task>, RemoteError>;

/// Receiving end of a task subscription.
///
/// Dropping it tells the store to stop pushing snapshots.
pub type SnapshotReceiver = mpsc::Receiver<SnapshotEvent>;

/// Async access to the hosted task collection of one identity at a time.
///
/// All listings are ordered by creation time, newest first.
pub trait RemoteTaskStore: Send + Sync + 'static {
    /// Create a task; the store assigns id and timestamps and returns the result.
    fn create(
        &self,
        scope: &UserScope,
        draft: &TaskDraft,
    ) -> impl std::future::Future<Output = Result<Task, RemoteError>> + Send;

    /// Merge the provided fields into an existing task.
    fn update(
        &self,
        scope: &UserScope,
        id: &TaskId,
        update: &TaskUpdate,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send;

    /// Delete a task.
    fn delete(
        &self,
        scope: &UserScope,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send;

    /// One-shot read of every task in the scope.
    fn fetch_all(
        &self,
        scope: &UserScope,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, RemoteError>> + Send;

    /// Open a live subscription.
    ///
    /// The receiver yields the current listing first and a fresh full
    /// listing after every change. Errors arrive in-band.
    fn subscribe(
        &self,
        scope: &UserScope,
    ) -> impl std::future::Future<Output = Result<SnapshotReceiver, RemoteError>> + Send;
}
