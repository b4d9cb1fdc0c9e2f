// ✅ Progress Evaluator
// Decides whether one day counts as "done" for one habit

use serde::Serialize;

use crate::entry::CompletionEntry;
use crate::model::Habit;

/// Completion state of a single habit-day
///
/// For binary habits `InProgress` never occurs: an entry is either absent
/// or completes the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    Absent,
    InProgress,
    GoalMet,
}

impl CompletionState {
    pub fn is_completed(&self) -> bool {
        matches!(self, CompletionState::GoalMet)
    }
}

/// Classify one entry against the habit definition
pub fn completion_state(habit: &Habit, entry: Option<&CompletionEntry>) -> CompletionState {
    let Some(entry) = entry else {
        return CompletionState::Absent;
    };

    if !habit.is_quantity {
        return CompletionState::GoalMet;
    }

    // Without a positive goal a quantitative habit can never be met
    match (habit.effective_goal(), entry.value) {
        (Some(goal), Some(value)) if value >= goal => CompletionState::GoalMet,
        _ => CompletionState::InProgress,
    }
}

pub fn is_completed(habit: &Habit, entry: Option<&CompletionEntry>) -> bool {
    completion_state(habit, entry).is_completed()
}

/// Completion of `date` within an arbitrary entry list (last entry for the day wins)
pub fn is_completed_on(habit: &Habit, entries: &[CompletionEntry], date: &str) -> bool {
    is_completed(habit, entries.iter().rfind(|e| e.date == date))
}
