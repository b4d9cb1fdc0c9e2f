// 📅 Completion Entry Codec
// One normalized shape for every stored completion record
//
// Storage may hold any of:
// - a bare date:               "2024-01-03"
// - a date + value object:     {"date": "2024-01-03", "value": 4}
// - either of the above, serialized again as a JSON string
//
// Everything is decoded once, here. Ledger, streak and XP logic only ever
// see `CompletionEntry`.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{HabitError, Result};

/// Canonical calendar-day format used for every entry date
pub const DAY_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// DAY HELPERS
// ============================================================================

/// Parse a canonical `YYYY-MM-DD` day.
///
/// Non-padded or otherwise non-canonical spellings ("2024-1-3") are rejected
/// so that string ordering and day ordering always agree.
pub fn parse_day(day: &str) -> Result<NaiveDate> {
    let parsed = NaiveDate::parse_from_str(day, DAY_FORMAT)
        .map_err(|_| HabitError::InvalidDate(day.to_string()))?;

    if format_day(parsed) != day {
        return Err(HabitError::InvalidDate(day.to_string()));
    }

    Ok(parsed)
}

pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

// ============================================================================
// COMPLETION ENTRY
// ============================================================================

/// Progress recorded for one habit on one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub date: String,

    /// Cumulative progress for quantitative habits, `None` for binary ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl CompletionEntry {
    /// Presence-only entry (binary habits)
    pub fn bare(date: impl Into<String>) -> Self {
        CompletionEntry {
            date: date.into(),
            value: None,
        }
    }

    /// Entry carrying a progress value (quantitative habits)
    pub fn with_value(date: impl Into<String>, value: f64) -> Self {
        CompletionEntry {
            date: date.into(),
            value: Some(value),
        }
    }

    pub fn day(&self) -> Result<NaiveDate> {
        parse_day(&self.date)
    }
}

/// Collapse duplicate dates, keeping the last entry seen for each day.
///
/// Surviving entries keep their relative order.
pub fn dedup_by_date(entries: &[CompletionEntry]) -> Vec<CompletionEntry> {
    let mut seen = HashSet::new();
    let mut result: Vec<CompletionEntry> = entries
        .iter()
        .rev()
        .filter(|e| seen.insert(e.date.clone()))
        .cloned()
        .collect();
    result.reverse();
    result
}

// ============================================================================
// DECODE
// ============================================================================

/// Decode one raw stored entry into its normalized form
pub fn decode(raw: &Value) -> Result<CompletionEntry> {
    match raw {
        Value::String(text) => decode_str(text),
        Value::Object(map) => {
            let date = map
                .get("date")
                .and_then(Value::as_str)
                .ok_or_else(|| HabitError::MalformedEntry(format!("missing date in {}", raw)))?;

            let value = match map.get("value") {
                None | Some(Value::Null) => None,
                Some(v) => Some(v.as_f64().ok_or_else(|| {
                    HabitError::MalformedEntry(format!("non-numeric value in {}", raw))
                })?),
            };

            Ok(CompletionEntry {
                date: stored_day(date)?,
                value,
            })
        }
        other => Err(HabitError::MalformedEntry(format!(
            "unexpected entry shape: {}",
            other
        ))),
    }
}

fn decode_str(text: &str) -> Result<CompletionEntry> {
    let trimmed = text.trim();

    // JSON-encoded object or string, unwrap one layer and try again
    if trimmed.starts_with('{') || trimmed.starts_with('"') {
        let nested: Value = serde_json::from_str(trimmed)
            .map_err(|e| HabitError::MalformedEntry(format!("{}: {}", trimmed, e)))?;
        return decode(&nested);
    }

    Ok(CompletionEntry::bare(stored_day(trimmed)?))
}

fn stored_day(day: &str) -> Result<String> {
    parse_day(day)
        .map(|_| day.to_string())
        .map_err(|_| HabitError::MalformedEntry(format!("invalid date {:?}", day)))
}

/// Decode the JSON array stored in a habit's `completed_dates` column.
///
/// An empty column is an empty history. The whole array may itself have been
/// stored as a JSON string. Repeated dates collapse to the last entry.
pub fn decode_list(raw: &str) -> Result<Vec<CompletionEntry>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut parsed: Value = serde_json::from_str(raw)
        .map_err(|e| HabitError::MalformedEntry(format!("completion list: {}", e)))?;

    if let Value::String(inner) = &parsed {
        parsed = serde_json::from_str(inner)
            .map_err(|e| HabitError::MalformedEntry(format!("completion list: {}", e)))?;
    }

    match parsed {
        Value::Array(items) => {
            let entries = items.iter().map(decode).collect::<Result<Vec<_>>>()?;
            Ok(dedup_by_date(&entries))
        }
        Value::Null => Ok(Vec::new()),
        other => Err(HabitError::MalformedEntry(format!(
            "completion list is not an array: {}",
            other
        ))),
    }
}

// ============================================================================
// ENCODE
// ============================================================================

/// Canonical storage form: bare date string, or `{date, value}` object
pub fn encode(entry: &CompletionEntry) -> Value {
    match entry.value {
        None => Value::String(entry.date.clone()),
        Some(value) => json!({ "date": entry.date, "value": value }),
    }
}

pub fn encode_list(entries: &[CompletionEntry]) -> Result<String> {
    let raw: Vec<Value> = entries.iter().map(encode).collect();
    Ok(serde_json::to_string(&raw)?)
}
