//! Property-based tests for text normalization and field validation.
//!
//! Uses proptest to verify:
//! 1. Normalized text has no leading, trailing, or repeated whitespace.
//! 2. Normalization is idempotent.
//! 3. Title validation agrees with the normalized length bounds.
//! 4. Stored documents always read back as complete tasks.
//! 5. Random bytes never panic the document decoder.

use proptest::prelude::*;
use taskdeck_proto::codec::{decode_document, encode_document};
use taskdeck_proto::task::{TaskDocument, TaskId, TaskUpdate, Timestamp};
use taskdeck_proto::validation::{
    MAX_DESCRIPTION_LENGTH, MAX_TITLE_LENGTH, UNTITLED_TASK, ValidationError, normalize_whitespace,
    title_or_untitled, validate_due_date, validate_task_description, validate_task_title,
};

/// Strings with plenty of whitespace runs in them.
fn arb_spaced_text(max: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(prop_oneof!["[a-zA-Z0-9]{1,6}", "[ \t\n]{1,4}"], 0..max)
        .prop_map(|parts| parts.concat())
}

fn arb_document() -> impl Strategy<Value = TaskDocument> {
    (
        proptest::option::of(arb_spaced_text(8)),
        proptest::option::of(arb_spaced_text(8)),
        any::<bool>(),
        proptest::option::of(0u64..u64::MAX / 2),
        proptest::option::of(0u64..u64::MAX / 2),
    )
        .prop_map(|(title, description, completed, created, due)| TaskDocument {
            title,
            description,
            completed,
            created_at: created.map(Timestamp::from_millis),
            due_date: due.map(Timestamp::from_millis),
            ..TaskDocument::default()
        })
}

proptest! {
    #[test]
    fn normalized_text_is_collapsed(raw in arb_spaced_text(24)) {
        let normalized = normalize_whitespace(&raw);
        prop_assert_eq!(normalized.trim(), normalized.as_str());
        prop_assert!(!normalized.contains("  "));
        prop_assert!(!normalized.contains(['\t', '\n']));
    }

    #[test]
    fn normalization_is_idempotent(raw in arb_spaced_text(24)) {
        let once = normalize_whitespace(&raw);
        prop_assert_eq!(normalize_whitespace(&once), once.clone());
        prop_assert_eq!(title_or_untitled(&once), title_or_untitled(&raw));
    }

    #[test]
    fn title_validation_matches_bounds(raw in arb_spaced_text(64)) {
        let length = normalize_whitespace(&raw).chars().count();
        let expected = if length == 0 {
            Err(ValidationError::EmptyTitle)
        } else if length > MAX_TITLE_LENGTH {
            Err(ValidationError::TitleTooLong)
        } else {
            Ok(())
        };
        prop_assert_eq!(validate_task_title(&raw), expected);
    }

    #[test]
    fn description_validation_matches_bound(len in 0usize..(MAX_DESCRIPTION_LENGTH * 2)) {
        let raw = "d".repeat(len);
        prop_assert_eq!(
            validate_task_description(&raw).is_ok(),
            len <= MAX_DESCRIPTION_LENGTH
        );
    }

    #[test]
    fn due_dates_round_down_and_reject_past(now in 60_000u64..u64::MAX / 4, offset in 0u64..10_000_000) {
        let now = Timestamp::from_millis(now);
        let future = Timestamp::from_millis(now.as_millis() + offset);
        let accepted = validate_due_date(future, now).unwrap();
        prop_assert_eq!(accepted.as_millis() % 60_000, 0);
        prop_assert!(accepted <= future);

        let past = Timestamp::from_millis(now.round_to_minute().as_millis() - 1);
        prop_assert_eq!(validate_due_date(past, now), Err(ValidationError::DueDateInPast));
    }

    #[test]
    fn stored_documents_read_back_complete(doc in arb_document(), read_at in 0u64..u64::MAX / 2) {
        let bytes = encode_document(&doc).unwrap();
        let task = decode_document(&bytes)
            .unwrap()
            .into_task(TaskId::new("t"), Timestamp::from_millis(read_at));
        prop_assert!(!task.title.is_empty());
        prop_assert_eq!(&task.title, &normalize_whitespace(&task.title));
        if doc.title.as_deref().map(normalize_whitespace).unwrap_or_default().is_empty()
            && doc.description.as_deref().map(normalize_whitespace).unwrap_or_default().is_empty()
        {
            prop_assert_eq!(task.title.as_str(), UNTITLED_TASK);
        }
        prop_assert_eq!(task.completed, doc.completed);
        prop_assert_eq!(
            task.created_at,
            doc.created_at.unwrap_or(Timestamp::from_millis(read_at))
        );
    }

    #[test]
    fn applying_an_update_never_touches_created_at(doc in arb_document(), completed in any::<bool>()) {
        let task = doc.into_task(TaskId::new("t"), Timestamp::from_millis(1));
        let now = Timestamp::from_millis(task.created_at.as_millis().saturating_add(1));
        let next = TaskUpdate::completed(completed).apply_to(&task, now);
        prop_assert_eq!(next.created_at, task.created_at);
        prop_assert_eq!(next.completed_at.is_some(), completed);
    }

    #[test]
    fn random_bytes_decode_no_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_document(&bytes);
    }
}
