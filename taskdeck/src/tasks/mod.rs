//! Identity-scoped task state and its synchronization with the remote store.
//!
//! [`TaskStore`] holds the state, [`reduce`] defines every transition,
//! [`TaskSync`] turns remote round-trips into actions, and [`views`]
//! derives what the UI shows from the current list.

pub mod reducer;
pub mod store;
pub mod sync;
pub mod views;

pub use reducer::{ActionOrigin, TaskAction, TaskState, reduce};
pub use store::{LoadingGuard, TaskStore};
pub use sync::{ErrorCallback, Subscription, TaskSync};

use thiserror::Error;

use crate::remote::RemoteError;

/// Shown when a failure carries no usable message.
pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors returned by [`TaskSync`] operations.
///
/// The same failure has already been written to [`TaskState::error`] by
/// the time the caller sees it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A create, update, delete or fetch round-trip failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// The live subscription could not be opened.
    #[error("could not subscribe to tasks: {0}")]
    Subscription(RemoteError),
}

/// Turns any failure into the text stored in state and shown to the user.
///
/// Uses the error's own message, or [`FALLBACK_ERROR_MESSAGE`] when that
/// message is blank.
#[must_use]
pub fn to_error_message(err: &dyn std::error::Error) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        FALLBACK_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}
