// ⭐ XP Accumulator
// Grants experience exactly once per newly-completed habit-day
//
// The grant is decided by diffing the completion state of one date before
// and after a ledger operation. Only a not-completed -> completed edge
// pays out; re-completing, exceeding an already met goal, or undoing a day
// never does.

use tracing::debug;

use crate::entry::CompletionEntry;
use crate::model::{Habit, User, UserProgress};
use crate::progress::is_completed_on;

/// XP awarded for each qualifying transition
pub const XP_PER_COMPLETION: u64 = 10;

/// XP needed per level
pub const XP_PER_LEVEL: u64 = 100;

/// `floor(xp / 100) + 1`
pub fn level_for_xp(xp: u64) -> u64 {
    xp / XP_PER_LEVEL + 1
}

/// True when `date` moved from not-completed to completed
pub fn is_new_completion(
    habit: &Habit,
    before: &[CompletionEntry],
    after: &[CompletionEntry],
    date: &str,
) -> bool {
    let was_completed = is_completed_on(habit, before, date);
    let is_now_completed = is_completed_on(habit, after, date);
    is_now_completed && !was_completed
}

/// New progress for `user` if this change completed `date`, `None` otherwise.
///
/// `None` means "habit updated, user unchanged" and is not an error.
pub fn grant_if_newly_completed(
    habit: &Habit,
    before: &[CompletionEntry],
    after: &[CompletionEntry],
    date: &str,
    user: &User,
) -> Option<UserProgress> {
    if !is_new_completion(habit, before, after, date) {
        return None;
    }

    let progress = UserProgress::from_xp(user.xp().saturating_add(XP_PER_COMPLETION));

    debug!(
        user_id = %user.id,
        habit_id = %habit.id,
        date,
        xp = progress.xp(),
        level = progress.level(),
        "xp grant due"
    );

    Some(progress)
}
