// 📒 Completion Ledger
// Pure transformations over one habit's entry list
//
// Every operation returns a fresh list and leaves its input alone. Callers
// persist the result. Entries for other dates are never touched, and no
// result ever contains two entries for the same day.

use tracing::debug;

use crate::entry::{dedup_by_date, CompletionEntry};
use crate::error::{HabitError, Result};

/// Flip presence of `date`: remove its entry if present, add a bare one if not.
///
/// Binary habits only.
pub fn toggle(entries: &[CompletionEntry], date: &str) -> Vec<CompletionEntry> {
    let mut result = dedup_by_date(entries);

    if let Some(pos) = result.iter().position(|e| e.date == date) {
        debug!(date, "toggle: removing entry");
        result.remove(pos);
    } else {
        debug!(date, "toggle: adding entry");
        result.push(CompletionEntry::bare(date));
    }

    result
}

/// Record the cumulative progress for `date`, replacing any earlier value.
///
/// A value of 0 still records an entry: "visited but no progress" is kept
/// apart from "never visited".
pub fn set_value(
    entries: &[CompletionEntry],
    date: &str,
    value: f64,
) -> Result<Vec<CompletionEntry>> {
    if !value.is_finite() || value < 0.0 {
        return Err(HabitError::InvalidValue(format!(
            "progress value must be >= 0, got {}",
            value
        )));
    }

    let mut result = dedup_by_date(entries);

    match result.iter_mut().find(|e| e.date == date) {
        Some(existing) => {
            debug!(date, old = ?existing.value, new = value, "set_value: replacing");
            existing.value = Some(value);
        }
        None => {
            debug!(date, value, "set_value: inserting");
            result.push(CompletionEntry::with_value(date, value));
        }
    }

    Ok(result)
}

/// Drop the entry for `date`; no-op when there is none
pub fn remove(entries: &[CompletionEntry], date: &str) -> Vec<CompletionEntry> {
    dedup_by_date(entries)
        .into_iter()
        .filter(|e| e.date != date)
        .collect()
}
