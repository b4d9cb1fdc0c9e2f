// ⚠️ Error Taxonomy
// Every failure the tracker can surface, split into client and internal errors

use thiserror::Error;

/// Errors produced by the completion engine and its store
#[derive(Debug, Error)]
pub enum HabitError {
    /// Habit or user does not exist, or is not owned by the caller
    #[error("not found: {0}")]
    NotFound(String),

    /// Progress value or goal outside the accepted range
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Date is not a canonical YYYY-MM-DD calendar day
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Operation does not apply to this kind of habit
    #[error("operation not supported for {kind} habit: {operation}")]
    KindMismatch {
        kind: &'static str,
        operation: &'static str,
    },

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Optimistic concurrency check failed, or a unique key already exists
    #[error("conflict: {0}")]
    Conflict(String),

    /// Stored completion record could not be decoded (storage-layer bug)
    #[error("malformed completion entry: {0}")]
    MalformedEntry(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("export error: {0}")]
    Export(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HabitError {
    /// True for errors caused by the caller's input rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HabitError::NotFound(_)
                | HabitError::InvalidValue(_)
                | HabitError::InvalidDate(_)
                | HabitError::KindMismatch { .. }
                | HabitError::Forbidden(_)
                | HabitError::Conflict(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HabitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_vs_internal_errors() {
        assert!(HabitError::NotFound("habit x".into()).is_client_error());
        assert!(HabitError::InvalidValue("-1".into()).is_client_error());
        assert!(!HabitError::MalformedEntry("{}".into()).is_client_error());
        assert!(!HabitError::Storage(rusqlite::Error::InvalidQuery).is_client_error());
    }

    #[test]
    fn test_error_messages() {
        let err = HabitError::KindMismatch {
            kind: "quantitative",
            operation: "toggle",
        };
        assert_eq!(
            err.to_string(),
            "operation not supported for quantitative habit: toggle"
        );
    }
}
