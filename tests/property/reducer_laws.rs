//! Property-based tests for the task reducer.
//!
//! Uses proptest to verify:
//! 1. Upserting the same task twice equals upserting it once.
//! 2. Updating an existing id never moves it.
//! 3. A new id always lands at index 0.
//! 4. Deleting an unknown id changes nothing.
//! 5. A snapshot replaces whatever single-entity writes came before it.
//! 6. Reset always yields the initial state.
//! 7. Ids stay unique under any action sequence.

use std::collections::HashSet;

use proptest::prelude::*;
use taskdeck::tasks::{TaskAction, TaskState, reduce};
use taskdeck_proto::task::{Task, TaskId, Timestamp};

// --- Strategies ---

/// Ids from a small pool so that sequences hit existing entries often.
fn arb_id() -> impl Strategy<Value = TaskId> {
    (0u8..8).prop_map(|n| TaskId::new(format!("t{n}")))
}

fn arb_task() -> impl Strategy<Value = Task> {
    (
        arb_id(),
        "[a-z ]{1,16}",
        any::<bool>(),
        0u64..1_000_000,
        proptest::option::of(0u64..1_000_000),
    )
        .prop_map(|(id, title, completed, created, due)| Task {
            id,
            title,
            description: String::new(),
            completed,
            created_at: Timestamp::from_millis(created),
            updated_at: Timestamp::from_millis(created),
            completed_at: completed.then(|| Timestamp::from_millis(created)),
            due_date: due.map(Timestamp::from_millis),
            notification_id: None,
        })
}

/// A list of tasks with unique ids, as a snapshot would deliver.
fn arb_snapshot() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(arb_task(), 0..8).prop_map(|tasks| {
        let mut seen = HashSet::new();
        tasks
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .collect()
    })
}

fn arb_action() -> impl Strategy<Value = TaskAction> {
    prop_oneof![
        arb_snapshot().prop_map(TaskAction::SetTasks),
        arb_task().prop_map(TaskAction::AddTask),
        arb_task().prop_map(TaskAction::UpdateTask),
        arb_id().prop_map(TaskAction::DeleteTask),
        any::<bool>().prop_map(TaskAction::SetLoading),
        proptest::option::of("[a-z]{1,8}").prop_map(TaskAction::SetError),
        any::<bool>().prop_map(TaskAction::SetInitialized),
        Just(TaskAction::Reset),
    ]
}

fn arb_state() -> impl Strategy<Value = TaskState> {
    prop::collection::vec(arb_action(), 0..16).prop_map(|actions| {
        actions
            .into_iter()
            .fold(TaskState::default(), |state, action| reduce(&state, action))
    })
}

fn ids(state: &TaskState) -> Vec<TaskId> {
    state.tasks.iter().map(|t| t.id.clone()).collect()
}

proptest! {
    #[test]
    fn upsert_is_idempotent(state in arb_state(), task in arb_task()) {
        let once = reduce(&state, TaskAction::UpdateTask(task.clone()));
        let twice = reduce(&once, TaskAction::UpdateTask(task));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn update_keeps_position(state in arb_state(), task in arb_task()) {
        prop_assume!(state.get(&task.id).is_some());
        let before = state.position(&task.id);
        let next = reduce(&state, TaskAction::UpdateTask(task.clone()));
        prop_assert_eq!(next.position(&task.id), before);
        prop_assert_eq!(next.tasks.len(), state.tasks.len());
        prop_assert_eq!(next.get(&task.id), Some(&task));
    }

    #[test]
    fn new_id_is_prepended(state in arb_state(), mut task in arb_task()) {
        task.id = TaskId::new("fresh");
        let next = reduce(&state, TaskAction::AddTask(task.clone()));
        prop_assert_eq!(&next.tasks[0], &task);
        prop_assert_eq!(&next.tasks[1..], &state.tasks[..]);
    }

    #[test]
    fn deleting_unknown_id_is_noop(state in arb_state()) {
        let next = reduce(&state, TaskAction::DeleteTask(TaskId::new("missing")));
        prop_assert_eq!(next, state);
    }

    #[test]
    fn snapshot_wins(
        state in arb_state(),
        writes in prop::collection::vec(arb_task(), 0..6),
        snapshot in arb_snapshot(),
    ) {
        let written = writes
            .into_iter()
            .fold(state, |s, task| reduce(&s, TaskAction::UpdateTask(task)));
        let next = reduce(&written, TaskAction::SetTasks(snapshot.clone()));
        prop_assert_eq!(next.tasks, snapshot);
        prop_assert!(!next.loading);
        prop_assert!(next.error.is_none());
        prop_assert!(next.initialized);
    }

    #[test]
    fn reset_clears_everything(state in arb_state()) {
        prop_assert_eq!(reduce(&state, TaskAction::Reset), TaskState::default());
    }

    #[test]
    fn ids_stay_unique(actions in prop::collection::vec(arb_action(), 0..32)) {
        let mut state = TaskState::default();
        for action in actions {
            state = reduce(&state, action);
            let all = ids(&state);
            let unique: HashSet<_> = all.iter().collect();
            prop_assert_eq!(unique.len(), all.len());
        }
    }
}
