// 📤 History Export
// Flat CSV view of every completion entry, one row per habit-day

use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::model::Habit;
use crate::progress::is_completed;

#[derive(Debug, Serialize)]
struct HistoryRow<'a> {
    habit_id: &'a str,
    title: &'a str,
    date: &'a str,
    value: Option<f64>,
    completed: bool,
}

/// Write the completion history of `habits`, oldest day first per habit.
/// Returns the number of rows written.
pub fn write_history_csv<W: Write>(habits: &[Habit], writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for habit in habits {
        let mut entries: Vec<_> = habit.completed_dates.iter().collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date));

        for entry in entries {
            wtr.serialize(HistoryRow {
                habit_id: &habit.id,
                title: &habit.title,
                date: &entry.date,
                value: entry.value,
                completed: is_completed(habit, Some(entry)),
            })?;
            rows += 1;
        }
    }

    wtr.flush()?;
    Ok(rows)
}
