//! Pure state transitions for the task collection.
//!
//! [`reduce`] maps `(state, action)` to the next state without touching
//! its input. Single-entity writes upsert by id: an existing id is
//! replaced where it stands, a new id goes to the front. Snapshots
//! replace the whole list.

use taskdeck_proto::task::{Task, TaskId};

/// Everything the UI needs to render the task list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskState {
    /// Tasks in display order, unique by id.
    pub tasks: Vec<Task>,
    /// A fetch or mutation round-trip is outstanding.
    pub loading: bool,
    /// Last surfaced failure message.
    pub error: Option<String>,
    /// The collection has been loaded (or a load failed) since the last reset.
    pub initialized: bool,
}

impl TaskState {
    /// Looks up a task by id.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == *id)
    }

    /// Returns the position of a task in the ordered list.
    #[must_use]
    pub fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == *id)
    }
}

/// Which write path an action arrives on.
///
/// Both paths feed the same reducer; the distinction only matters for
/// reasoning about ordering and for logs. A later [`ActionOrigin::Snapshot`]
/// always overrides earlier single-entity writes for the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOrigin {
    /// Flag changes raised by the client itself (loading, errors, reset).
    LocalIntent,
    /// A single-entity write issued after the remote store accepted it.
    RemoteConfirmed,
    /// A full authoritative listing from the remote store.
    Snapshot,
}

impl std::fmt::Display for ActionOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalIntent => write!(f, "local"),
            Self::RemoteConfirmed => write!(f, "confirmed"),
            Self::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// The closed set of state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAction {
    /// Replace the list wholesale; clears loading and error, marks initialized.
    SetTasks(Vec<Task>),
    /// Upsert a newly created task.
    AddTask(Task),
    /// Upsert a modified task.
    UpdateTask(Task),
    /// Remove a task by id; unknown ids are ignored.
    DeleteTask(TaskId),
    /// Set the loading flag.
    SetLoading(bool),
    /// Set or clear the error; setting one also marks initialized.
    SetError(Option<String>),
    /// Set the initialized flag.
    SetInitialized(bool),
    /// Return to the initial state.
    Reset,
}

impl TaskAction {
    /// Returns the write path this action belongs to.
    #[must_use]
    pub const fn origin(&self) -> ActionOrigin {
        match self {
            Self::SetTasks(_) => ActionOrigin::Snapshot,
            Self::AddTask(_) | Self::UpdateTask(_) | Self::DeleteTask(_) => {
                ActionOrigin::RemoteConfirmed
            }
            Self::SetLoading(_) | Self::SetError(_) | Self::SetInitialized(_) | Self::Reset => {
                ActionOrigin::LocalIntent
            }
        }
    }

    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetTasks(_) => "set_tasks",
            Self::AddTask(_) => "add_task",
            Self::UpdateTask(_) => "update_task",
            Self::DeleteTask(_) => "delete_task",
            Self::SetLoading(_) => "set_loading",
            Self::SetError(_) => "set_error",
            Self::SetInitialized(_) => "set_initialized",
            Self::Reset => "reset",
        }
    }
}

/// Inserts or replaces `next` by id.
///
/// A matching id keeps its position, so a confirmation of a task the
/// user already sees never moves it. Only a new id is prepended.
#[must_use]
pub fn upsert_task(tasks: &[Task], next: Task) -> Vec<Task> {
    match tasks.iter().position(|t| t.id == next.id) {
        Some(index) => {
            let mut updated = tasks.to_vec();
            updated[index] = next;
            updated
        }
        None => {
            let mut updated = Vec::with_capacity(tasks.len() + 1);
            updated.push(next);
            updated.extend_from_slice(tasks);
            updated
        }
    }
}

/// Returns `tasks` without the entry for `id`.
#[must_use]
pub fn remove_task(tasks: &[Task], id: &TaskId) -> Vec<Task> {
    tasks.iter().filter(|t| t.id != *id).cloned().collect()
}

/// Computes the state that follows `action`.
#[must_use]
pub fn reduce(state: &TaskState, action: TaskAction) -> TaskState {
    match action {
        TaskAction::SetTasks(tasks) => TaskState {
            tasks,
            loading: false,
            error: None,
            initialized: true,
        },
        TaskAction::AddTask(task) | TaskAction::UpdateTask(task) => TaskState {
            tasks: upsert_task(&state.tasks, task),
            ..state.clone()
        },
        TaskAction::DeleteTask(id) => TaskState {
            tasks: remove_task(&state.tasks, &id),
            ..state.clone()
        },
        TaskAction::SetLoading(loading) => TaskState {
            loading,
            ..state.clone()
        },
        TaskAction::SetError(error) => {
            // An attempted-and-failed load still counts as initialized.
            let initialized = state.initialized || error.is_some();
            TaskState {
                error,
                initialized,
                ..state.clone()
            }
        }
        TaskAction::SetInitialized(initialized) => TaskState {
            initialized,
            ..state.clone()
        },
        TaskAction::Reset => TaskState::default(),
    }
}
