//! `Taskdeck`: task list client core.
//!
//! Keeps one identity-scoped task collection in memory, applies local
//! mutations as soon as the remote store confirms them, and lets remote
//! snapshots overwrite the collection wholesale.

pub mod app;
pub mod auth;
pub mod config;
pub mod remote;
pub mod session;
pub mod tasks;
