//! Shared task model and document format for `Taskdeck`.

pub mod codec;
pub mod task;
pub mod validation;
