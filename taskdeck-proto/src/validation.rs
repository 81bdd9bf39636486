//! Normalization and validation of user-entered task fields.
//!
//! All functions here are pure. Callers run them at the edit boundary,
//! before anything is handed to the sync layer; a failed check never
//! reaches the remote store or the shared task state.

use crate::task::Timestamp;

/// Minimum task title length in characters, after normalization.
pub const MIN_TITLE_LENGTH: usize = 1;

/// Maximum task title length in characters, after normalization.
pub const MAX_TITLE_LENGTH: usize = 120;

/// Maximum task description length in characters, after normalization.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Title used when normalization leaves nothing behind.
pub const UNTITLED_TASK: &str = "Untitled task";

/// Errors raised by field validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Title is empty after trimming and whitespace collapsing.
    #[error("Task title cannot be empty.")]
    EmptyTitle,
    /// Title exceeds [`MAX_TITLE_LENGTH`] characters.
    #[error("Task title must be {max} characters or fewer.", max = MAX_TITLE_LENGTH)]
    TitleTooLong,
    /// Description exceeds [`MAX_DESCRIPTION_LENGTH`] characters.
    #[error("Task description must be {max} characters or fewer.", max = MAX_DESCRIPTION_LENGTH)]
    DescriptionTooLong,
    /// Due date lies before the current minute.
    #[error("Choose a time in the future.")]
    DueDateInPast,
}

/// Trims the value and collapses every internal whitespace run to a single space.
#[must_use]
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes a task title.
#[must_use]
pub fn normalize_title(value: &str) -> String {
    normalize_whitespace(value)
}

/// Normalizes a task description.
#[must_use]
pub fn normalize_description(value: &str) -> String {
    normalize_whitespace(value)
}

/// Normalizes a title, substituting [`UNTITLED_TASK`] when nothing is left.
#[must_use]
pub fn title_or_untitled(value: &str) -> String {
    let normalized = normalize_title(value);
    if normalized.is_empty() {
        UNTITLED_TASK.to_string()
    } else {
        normalized
    }
}

/// Checks a raw title against the length bounds.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyTitle`] if the normalized title is empty,
/// or [`ValidationError::TitleTooLong`] if it exceeds [`MAX_TITLE_LENGTH`].
pub fn validate_task_title(value: &str) -> Result<(), ValidationError> {
    let length = normalize_title(value).chars().count();
    if length < MIN_TITLE_LENGTH {
        return Err(ValidationError::EmptyTitle);
    }
    if length > MAX_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(())
}

/// Checks a raw description against the length bound.
///
/// An empty description is always valid since the field is optional.
///
/// # Errors
///
/// Returns [`ValidationError::DescriptionTooLong`] if the normalized
/// description exceeds [`MAX_DESCRIPTION_LENGTH`].
pub fn validate_task_description(value: &str) -> Result<(), ValidationError> {
    if normalize_description(value).chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::DescriptionTooLong);
    }
    Ok(())
}

/// Truncates raw description input to [`MAX_DESCRIPTION_LENGTH`] characters.
///
/// Used by input fields to cap what the user can type.
#[must_use]
pub fn enforce_description_limit(value: &str) -> String {
    value.chars().take(MAX_DESCRIPTION_LENGTH).collect()
}

/// Checks a due date picked at `now`, returning it rounded down to the minute.
///
/// # Errors
///
/// Returns [`ValidationError::DueDateInPast`] if the rounded candidate is
/// earlier than the current minute.
pub fn validate_due_date(candidate: Timestamp, now: Timestamp) -> Result<Timestamp, ValidationError> {
    let rounded = candidate.round_to_minute();
    if rounded < now.round_to_minute() {
        return Err(ValidationError::DueDateInPast);
    }
    Ok(rounded)
}
