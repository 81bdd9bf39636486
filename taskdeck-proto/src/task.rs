//! Task model shared by the client core and the document store.
//!
//! [`Task`] is the normalized, in-memory entity the client renders.
//! [`TaskDocument`] is the looser shape persisted by the store, where
//! optional fields may be missing and are filled in on read.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{UNTITLED_TASK, normalize_description, normalize_title, title_or_untitled};

const MILLIS_PER_MINUTE: u64 = 60_000;

/// Opaque task identifier assigned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh time-ordered identifier (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Milliseconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Creates a timestamp from milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Drops the seconds and milliseconds components.
    #[must_use]
    pub const fn round_to_minute(&self) -> Self {
        Self(self.0 - self.0 % MILLIS_PER_MINUTE)
    }

    /// Returns this timestamp shifted forward by whole minutes.
    #[must_use]
    pub const fn plus_minutes(&self, minutes: u64) -> Self {
        Self(self.0.saturating_add(minutes.saturating_mul(MILLIS_PER_MINUTE)))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A user's to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned identifier, stable for the task's lifetime.
    pub id: TaskId,
    /// Normalized, non-empty title.
    pub title: String,
    /// Normalized description; empty when not provided.
    pub description: String,
    /// Whether the task is done.
    pub completed: bool,
    /// Creation time, never changed afterwards.
    pub created_at: Timestamp,
    /// Time of the last create or update.
    pub updated_at: Timestamp,
    /// When the task was last marked done; `None` while open.
    pub completed_at: Option<Timestamp>,
    /// Optional minute-granularity deadline.
    pub due_date: Option<Timestamp>,
    /// Correlates to an externally scheduled reminder. Never interpreted here.
    pub notification_id: Option<String>,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    /// Raw title as entered.
    pub title: String,
    /// Raw description as entered.
    pub description: Option<String>,
    /// Optional deadline.
    pub due_date: Option<Timestamp>,
    /// Optional reminder correlation id.
    pub notification_id: Option<String>,
}

impl TaskDraft {
    /// Creates a draft with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due_date: Timestamp) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// Partial update of a task.
///
/// `None` leaves a field unchanged. For the nullable fields, `Some(None)`
/// clears the value and `Some(Some(_))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    /// New raw title.
    pub title: Option<String>,
    /// New raw description.
    pub description: Option<String>,
    /// New completion state.
    pub completed: Option<bool>,
    /// New due date, or `Some(None)` to clear it.
    pub due_date: Option<Option<Timestamp>>,
    /// New reminder id, or `Some(None)` to clear it.
    pub notification_id: Option<Option<String>>,
}

impl TaskUpdate {
    /// Update that only toggles completion.
    #[must_use]
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    /// Update that only replaces the title.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Returns `true` if no field would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.due_date.is_none()
            && self.notification_id.is_none()
    }

    /// Produces the task that results from applying this update at `now`.
    ///
    /// Title and description are normalized the same way as on create.
    /// `updated_at` is always bumped. When `completed` is part of the
    /// update, `completed_at` follows it: stamped with `now` when the task
    /// becomes done (kept if it already was), cleared when reopened.
    #[must_use]
    pub fn apply_to(&self, task: &Task, now: Timestamp) -> Task {
        let mut next = task.clone();
        if let Some(title) = &self.title {
            next.title = title_or_untitled(title);
        }
        if let Some(description) = &self.description {
            next.description = normalize_description(description);
        }
        if let Some(completed) = self.completed {
            next.completed_at = match (completed, task.completed, task.completed_at) {
                (true, true, Some(at)) => Some(at),
                (true, _, _) => Some(now),
                (false, _, _) => None,
            };
            next.completed = completed;
        }
        if let Some(due_date) = self.due_date {
            next.due_date = due_date;
        }
        if let Some(notification_id) = &self.notification_id {
            next.notification_id.clone_from(notification_id);
        }
        next.updated_at = now;
        next
    }
}

/// Task as persisted by the document store.
///
/// Fields may be absent in stored data; [`into_task`](Self::into_task)
/// fills the gaps so the client always sees a complete [`Task`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDocument {
    /// Stored title, if any.
    pub title: Option<String>,
    /// Stored description; `None` when empty.
    pub description: Option<String>,
    /// Completion flag.
    pub completed: bool,
    /// Server-assigned creation time.
    pub created_at: Option<Timestamp>,
    /// Server-assigned modification time.
    pub updated_at: Option<Timestamp>,
    /// Server-assigned completion time.
    pub completed_at: Option<Timestamp>,
    /// Deadline.
    pub due_date: Option<Timestamp>,
    /// Reminder correlation id.
    pub notification_id: Option<String>,
}

impl TaskDocument {
    /// Builds the document stored for a new task, stamped with the server clock.
    #[must_use]
    pub fn from_draft(draft: &TaskDraft, server_now: Timestamp) -> Self {
        let description = normalize_description(draft.description.as_deref().unwrap_or_default());
        Self {
            title: Some(title_or_untitled(&draft.title)),
            description: (!description.is_empty()).then_some(description),
            completed: false,
            created_at: Some(server_now),
            updated_at: Some(server_now),
            completed_at: None,
            due_date: draft.due_date,
            notification_id: draft.notification_id.clone(),
        }
    }

    /// Maps a stored document to a [`Task`].
    ///
    /// The title falls back to the description and then to
    /// [`UNTITLED_TASK`]. Missing creation/modification times fall back
    /// to `read_at`.
    #[must_use]
    pub fn into_task(self, id: TaskId, read_at: Timestamp) -> Task {
        let description = normalize_description(self.description.as_deref().unwrap_or_default());
        let title = Some(normalize_title(self.title.as_deref().unwrap_or_default()))
            .filter(|t| !t.is_empty())
            .or_else(|| Some(description.clone()).filter(|d| !d.is_empty()))
            .unwrap_or_else(|| UNTITLED_TASK.to_string());
        Task {
            id,
            title,
            description,
            completed: self.completed,
            created_at: self.created_at.unwrap_or(read_at),
            updated_at: self.updated_at.unwrap_or(read_at),
            completed_at: self.completed_at,
            due_date: self.due_date,
            notification_id: self.notification_id,
        }
    }
}

impl From<&Task> for TaskDocument {
    fn from(task: &Task) -> Self {
        Self {
            title: Some(task.title.clone()),
            description: (!task.description.is_empty()).then(|| task.description.clone()),
            completed: task.completed,
            created_at: Some(task.created_at),
            updated_at: Some(task.updated_at),
            completed_at: task.completed_at,
            due_date: task.due_date,
            notification_id: task.notification_id.clone(),
        }
    }
}
