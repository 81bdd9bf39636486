//! Read-only projections of the task list.
//!
//! Nothing here touches state; every function recomputes from the slice
//! it is given.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, TimeZone};

use taskdeck_proto::task::{Task, Timestamp};
use taskdeck_proto::validation::normalize_whitespace;

const MINUTE_MS: i64 = 60 * 1000;

/// Which completion states a listing shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    /// Returns `true` if `task` belongs in this listing.
    #[must_use]
    pub const fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Active => !task.completed,
            Self::Completed => task.completed,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Error returned when a filter name is not one of `all|active|completed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status filter: {0} (expected all, active or completed)")]
pub struct ParseStatusFilterError(String);

impl FromStr for StatusFilter {
    type Err = ParseStatusFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            _ => Err(ParseStatusFilterError(s.to_string())),
        }
    }
}

/// Number of tasks per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub all: usize,
    pub active: usize,
    pub completed: usize,
}

impl StatusCounts {
    /// Count for one filter.
    #[must_use]
    pub const fn get(&self, filter: StatusFilter) -> usize {
        match filter {
            StatusFilter::All => self.all,
            StatusFilter::Active => self.active,
            StatusFilter::Completed => self.completed,
        }
    }
}

/// Counts tasks by status in one pass.
#[must_use]
pub fn status_counts(tasks: &[Task]) -> StatusCounts {
    tasks.iter().fold(StatusCounts::default(), |mut counts, task| {
        counts.all += 1;
        if task.completed {
            counts.completed += 1;
        } else {
            counts.active += 1;
        }
        counts
    })
}

/// Tasks matching `filter` whose title or description contains `query`.
///
/// Matching is a case-insensitive substring test; a blank query matches
/// everything. Order is preserved.
#[must_use]
pub fn filter_tasks<'a>(tasks: &'a [Task], filter: StatusFilter, query: &str) -> Vec<&'a Task> {
    let needle = search_key(query);
    tasks
        .iter()
        .filter(|task| filter.matches(task))
        .filter(|task| {
            needle.is_empty()
                || search_key(&task.title).contains(&needle)
                || search_key(&task.description).contains(&needle)
        })
        .collect()
}

/// Lower-cased, whitespace-collapsed form used for matching.
fn search_key(value: &str) -> String {
    normalize_whitespace(value).to_lowercase()
}

/// Why a listing came out empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    /// There are no tasks at all and nothing is being filtered.
    NoTasksYet,
    /// Tasks exist, or a filter is active, but none match.
    NoMatches,
}

impl EmptyState {
    /// Headline for the empty listing.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::NoTasksYet => "Get started by adding your first task!",
            Self::NoMatches => "No tasks match your filters.",
        }
    }
}

/// Classifies an empty listing, or returns `None` when something matches.
#[must_use]
pub fn classify_empty(tasks: &[Task], filter: StatusFilter, query: &str) -> Option<EmptyState> {
    if !filter_tasks(tasks, filter, query).is_empty() {
        return None;
    }
    if tasks.is_empty() && filter == StatusFilter::All && search_key(query).is_empty() {
        Some(EmptyState::NoTasksYet)
    } else {
        Some(EmptyState::NoMatches)
    }
}

/// Returns `true` if `task` is open and its due date has passed.
#[must_use]
pub fn is_overdue(task: &Task, now: Timestamp) -> bool {
    !task.completed && task.due_date.is_some_and(|due| due < now)
}

/// Describes `ts` relative to `now`, e.g. "5 minutes ago" or "in 2 hours".
///
/// Minutes, hours and days are each rounded to the nearest unit. Anything
/// under half a minute away is "Just now".
#[must_use]
pub fn format_relative_time(ts: Timestamp, now: Timestamp) -> String {
    let diff_ms = ms_to_i64(now.as_millis()) - ms_to_i64(ts.as_millis());
    let minutes = div_round(diff_ms, MINUTE_MS);
    if minutes == 0 {
        return "Just now".to_string();
    }
    if minutes.abs() < 60 {
        return relative(minutes, "minute");
    }
    let hours = div_round(minutes, 60);
    if hours.abs() < 24 {
        return relative(hours, "hour");
    }
    match div_round(hours, 24) {
        1 => "yesterday".to_string(),
        -1 => "tomorrow".to_string(),
        days => relative(days, "day"),
    }
}

/// Formats `ts` in local time with a `chrono` format string.
///
/// Returns `"??"` if the instant cannot be represented.
#[must_use]
pub fn format_due_date(ts: Timestamp, format: &str) -> String {
    let millis = ms_to_i64(ts.as_millis());
    match Local.timestamp_millis_opt(millis) {
        chrono::LocalResult::Single(dt) => dt.format(format).to_string(),
        chrono::LocalResult::Ambiguous(earliest, _) => earliest.format(format).to_string(),
        chrono::LocalResult::None => "??".to_string(),
    }
}

/// Past amounts are positive.
fn relative(amount: i64, unit: &str) -> String {
    let count = amount.unsigned_abs();
    let plural = if count == 1 { "" } else { "s" };
    if amount > 0 {
        format!("{count} {unit}{plural} ago")
    } else {
        format!("in {count} {unit}{plural}")
    }
}

/// Integer division rounding half away from zero.
const fn div_round(value: i64, divisor: i64) -> i64 {
    let half = divisor / 2;
    if value >= 0 {
        (value + half) / divisor
    } else {
        (value - half) / divisor
    }
}

fn ms_to_i64(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}
