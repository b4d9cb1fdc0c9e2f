// 🔥 Streak Calculator
// Consecutive completed days ending today or yesterday
//
// A broken streak shows as zero immediately: if the latest entry is older
// than yesterday there is no current streak, however long the history.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};

use crate::entry::{parse_day, CompletionEntry};
use crate::error::{HabitError, Result};
use crate::model::Habit;
use crate::progress::is_completed;

/// Current UTC calendar day, the single "today" used for evaluation
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Length of the run of `days` (sorted most recent first) anchored at today
/// or yesterday. Each element carries whether that day counts as completed;
/// the walk stops at the first gap or the first day that does not count.
fn anchored_run(days: &[(NaiveDate, bool)], today: NaiveDate) -> u32 {
    let Some(&(anchor, _)) = days.first() else {
        return 0;
    };

    if anchor != today && Some(anchor) != today.pred_opt() {
        return 0;
    }

    let mut expected = anchor;
    let mut count = 0;

    for &(day, counts) in days {
        let gap = (expected - day).num_days().abs();
        if gap > 1 || !counts {
            break;
        }
        count += 1;
        expected = day;
    }

    count
}

fn entry_day(entry: &CompletionEntry) -> Result<NaiveDate> {
    parse_day(&entry.date)
        .map_err(|_| HabitError::MalformedEntry(format!("invalid date {:?}", entry.date)))
}

/// Streak of `habit` over `entries`, evaluated as of `today`.
///
/// Binary habits count every recorded day. Quantitative habits stop at the
/// first day whose value misses the goal, so a habit without a positive goal
/// never has a streak.
pub fn streak(entries: &[CompletionEntry], habit: &Habit, today: NaiveDate) -> Result<u32> {
    if entries.is_empty() {
        return Ok(0);
    }

    // Reversed so the stable sort leaves the last entry of a repeated day first
    let mut days = entries
        .iter()
        .rev()
        .map(|entry| -> Result<(NaiveDate, bool)> {
            let counts = !habit.is_quantity || is_completed(habit, Some(entry));
            Ok((entry_day(entry)?, counts))
        })
        .collect::<Result<Vec<_>>>()?;

    days.sort_by(|a, b| b.0.cmp(&a.0));
    days.dedup_by_key(|(day, _)| *day);

    Ok(anchored_run(&days, today))
}

/// Streak as of the current UTC day
pub fn current_streak(entries: &[CompletionEntry], habit: &Habit) -> Result<u32> {
    streak(entries, habit, today_utc())
}

/// Run of days on which at least one of `habits` was completed
pub fn overall_streak(habits: &[Habit], today: NaiveDate) -> Result<u32> {
    let mut completed = BTreeSet::new();

    for habit in habits {
        for entry in &habit.completed_dates {
            if is_completed(habit, Some(entry)) {
                completed.insert(entry_day(entry)?);
            }
        }
    }

    let days: Vec<(NaiveDate, bool)> = completed.into_iter().rev().map(|d| (d, true)).collect();
    Ok(anchored_run(&days, today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::tests::{binary_habit, quantity_habit};

    fn day(raw: &str) -> NaiveDate {
        parse_day(raw).unwrap()
    }

    fn bare(dates: &[&str]) -> Vec<CompletionEntry> {
        dates.iter().map(|d| CompletionEntry::bare(*d)).collect()
    }

    #[test]
    fn test_empty_history_has_no_streak() {
        assert_eq!(streak(&[], &binary_habit(), day("2024-01-03")).unwrap(), 0);
    }

    #[test]
    fn test_three_consecutive_days() {
        let entries = bare(&["2024-01-03", "2024-01-02", "2024-01-01"]);
        assert_eq!(streak(&entries, &binary_habit(), day("2024-01-03")).unwrap(), 3);
    }

    #[test]
    fn test_gap_breaks_streak() {
        let entries = bare(&["2024-01-03", "2024-01-01"]);
        assert_eq!(streak(&entries, &binary_habit(), day("2024-01-03")).unwrap(), 1);
    }

    #[test]
    fn test_anchor_yesterday_still_counts() {
        let entries = bare(&["2024-01-02", "2024-01-01"]);
        assert_eq!(streak(&entries, &binary_habit(), day("2024-01-03")).unwrap(), 2);
    }

    #[test]
    fn test_stale_anchor_gives_zero() {
        let entries = bare(&[
            "2024-01-01",
            "2023-12-31",
            "2023-12-30",
            "2023-12-29",
            "2023-12-28",
        ]);
        assert_eq!(streak(&entries, &binary_habit(), day("2024-01-03")).unwrap(), 0);
    }

    #[test]
    fn test_future_anchor_gives_zero() {
        let entries = bare(&["2024-01-05", "2024-01-04", "2024-01-03"]);
        assert_eq!(streak(&entries, &binary_habit(), day("2024-01-03")).unwrap(), 0);
    }

    #[test]
    fn test_unsorted_input_and_month_boundary() {
        let entries = bare(&["2024-02-28", "2024-03-01", "2024-02-29", "2024-02-26"]);
        assert_eq!(streak(&entries, &binary_habit(), day("2024-03-01")).unwrap(), 3);
    }

    #[test]
    fn test_duplicate_dates_count_once() {
        let entries = bare(&["2024-01-03", "2024-01-03", "2024-01-02"]);
        assert_eq!(streak(&entries, &binary_habit(), day("2024-01-03")).unwrap(), 2);
    }

    #[test]
    fn test_quantity_day_below_goal_breaks_streak() {
        let habit = quantity_habit(Some(10.0));
        let entries = vec![
            CompletionEntry::with_value("2024-01-03", 12.0),
            CompletionEntry::with_value("2024-01-02", 0.0),
            CompletionEntry::with_value("2024-01-01", 10.0),
        ];
        assert_eq!(streak(&entries, &habit, day("2024-01-03")).unwrap(), 1);
    }

    #[test]
    fn test_repeated_day_uses_last_entry() {
        let habit = quantity_habit(Some(10.0));
        let entries = vec![
            CompletionEntry::with_value("2024-01-03", 2.0),
            CompletionEntry::with_value("2024-01-02", 10.0),
            CompletionEntry::with_value("2024-01-03", 11.0),
        ];
        assert_eq!(streak(&entries, &habit, day("2024-01-03")).unwrap(), 2);
    }

    #[test]
    fn test_quantity_partial_anchor_gives_zero() {
        let habit = quantity_habit(Some(10.0));
        let entries = vec![
            CompletionEntry::with_value("2024-01-03", 4.0),
            CompletionEntry::with_value("2024-01-02", 10.0),
        ];
        assert_eq!(streak(&entries, &habit, day("2024-01-03")).unwrap(), 0);
    }

    #[test]
    fn test_quantity_without_goal_never_streaks() {
        let habit = quantity_habit(None);
        let entries = vec![
            CompletionEntry::with_value("2024-01-03", 50.0),
            CompletionEntry::with_value("2024-01-02", 50.0),
        ];
        assert_eq!(streak(&entries, &habit, day("2024-01-03")).unwrap(), 0);
    }

    #[test]
    fn test_malformed_date_is_reported() {
        let entries = bare(&["2024-01-03", "yesterday"]);
        assert!(matches!(
            streak(&entries, &binary_habit(), day("2024-01-03")),
            Err(HabitError::MalformedEntry(_))
        ));
    }

    #[test]
    fn test_overall_streak_unions_completed_days() {
        let mut read = binary_habit();
        read.completed_dates = bare(&["2024-01-03", "2024-01-01"]);

        let mut water = quantity_habit(Some(8.0));
        water.completed_dates = vec![
            CompletionEntry::with_value("2024-01-02", 8.0),
            // Below goal, does not fill the 12-31 gap
            CompletionEntry::with_value("2023-12-31", 2.0),
        ];

        assert_eq!(overall_streak(&[read, water], day("2024-01-03")).unwrap(), 3);
        assert_eq!(overall_streak(&[], day("2024-01-03")).unwrap(), 0);
    }
}
