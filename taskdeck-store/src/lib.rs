//! In-process document store for per-user task collections.
//!
//! Plays the role of the hosted backend: assigns ids and server
//! timestamps, keeps each user's tasks isolated, and pushes a full
//! snapshot to every watcher after each change.

pub mod store;

pub use store::{DocumentStore, StoreError};
