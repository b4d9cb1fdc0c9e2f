// 🧩 Data Model - Habits, Users and their progression
//
// A Habit owns its completion history. A User owns habits and an XP total;
// the level is always derived from XP, never stored as independent truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::CompletionEntry;
use crate::error::{HabitError, Result};

// ============================================================================
// FREQUENCY
// ============================================================================

/// How often a habit is meant to be done (descriptive only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    pub fn parse(raw: &str) -> Option<Frequency> {
        match raw.to_lowercase().as_str() {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            _ => None,
        }
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::Daily
    }
}

// ============================================================================
// HABIT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub user_id: String,

    // Descriptive fields, never evaluated by the engine
    pub title: String,
    pub category: String,
    pub frequency: Frequency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Value-based completion when true, presence-based when false
    pub is_quantity: bool,

    /// Target value for quantitative habits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_value: Option<f64>,

    /// At most one entry per calendar day
    pub completed_dates: Vec<CompletionEntry>,

    /// Bumped on every persisted change of `completed_dates`
    pub revision: i64,

    pub created_at: DateTime<Utc>,
}

impl Habit {
    /// Goal value if this habit can be completed by value at all
    pub fn effective_goal(&self) -> Option<f64> {
        match self.goal_value {
            Some(goal) if self.is_quantity && goal > 0.0 => Some(goal),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        if self.is_quantity {
            "quantitative"
        } else {
            "binary"
        }
    }

    /// Entry recorded for `date`; the last one wins if the history repeats a day
    pub fn entry_for(&self, date: &str) -> Option<&CompletionEntry> {
        self.completed_dates.iter().rfind(|e| e.date == date)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Descriptive fields supplied when creating or editing a habit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitDetails {
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub is_quantity: bool,
    #[serde(default)]
    pub goal_value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl HabitDetails {
    /// Quantitative habits need a positive, finite goal; binary ones drop it
    pub fn validate(mut self) -> Result<HabitDetails> {
        if self.title.trim().is_empty() {
            return Err(HabitError::InvalidValue("title must not be empty".into()));
        }

        if self.is_quantity {
            match self.goal_value {
                Some(goal) if goal.is_finite() && goal > 0.0 => {}
                Some(goal) => {
                    return Err(HabitError::InvalidValue(format!(
                        "goal value must be positive, got {}",
                        goal
                    )))
                }
                None => {
                    return Err(HabitError::InvalidValue(
                        "quantitative habits need a goal value".into(),
                    ))
                }
            }
        } else {
            self.goal_value = None;
        }

        Ok(self)
    }
}

/// Partial edit of a habit. Omitted fields keep their stored values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub is_quantity: Option<bool>,
    #[serde(default)]
    pub goal_value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl HabitUpdate {
    /// Merge onto `habit` and validate the result.
    ///
    /// The kind (binary or quantitative) is fixed once a habit has history:
    /// the same entries would be judged by different rules.
    pub fn apply_to(self, habit: &Habit) -> Result<HabitDetails> {
        let is_quantity = self.is_quantity.unwrap_or(habit.is_quantity);

        if is_quantity != habit.is_quantity && !habit.completed_dates.is_empty() {
            return Err(HabitError::KindMismatch {
                kind: habit.kind(),
                operation: "change the kind of a habit with history",
            });
        }

        HabitDetails {
            title: self.title.unwrap_or_else(|| habit.title.clone()),
            category: self.category.unwrap_or_else(|| habit.category.clone()),
            frequency: self.frequency.unwrap_or(habit.frequency),
            start_time: self.start_time.or_else(|| habit.start_time.clone()),
            end_time: self.end_time.or_else(|| habit.end_time.clone()),
            is_quantity,
            goal_value: self.goal_value.or(habit.goal_value),
            unit: self.unit.or_else(|| habit.unit.clone()),
        }
        .validate()
    }
}

// ============================================================================
// USER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
    /// Serialized inline as `xp` and `level`
    #[serde(flatten)]
    pub progress: UserProgress,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn progress(&self) -> UserProgress {
        self.progress
    }

    pub fn xp(&self) -> u64 {
        self.progress.xp()
    }

    pub fn level(&self) -> u64 {
        self.progress.level()
    }
}

/// XP total with its derived level.
///
/// Only constructible from XP so the two can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserProgress {
    xp: u64,
    level: u64,
}

impl UserProgress {
    pub fn from_xp(xp: u64) -> Self {
        UserProgress {
            xp,
            level: crate::xp::level_for_xp(xp),
        }
    }

    pub fn xp(&self) -> u64 {
        self.xp
    }

    pub fn level(&self) -> u64 {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(is_quantity: bool, goal_value: Option<f64>) -> HabitDetails {
        HabitDetails {
            title: "Read".into(),
            category: "Learning".into(),
            is_quantity,
            goal_value,
            ..Default::default()
        }
    }

    #[test]
    fn test_frequency_parse() {
        assert_eq!(Frequency::parse("Weekly"), Some(Frequency::Weekly));
        assert_eq!(Frequency::parse("yearly"), None);
        assert_eq!(Frequency::Monthly.as_str(), "monthly");
    }

    #[test]
    fn test_details_validation() {
        assert!(details(true, Some(10.0)).validate().is_ok());
        assert!(details(true, None).validate().is_err());
        assert!(details(true, Some(0.0)).validate().is_err());
        assert!(details(true, Some(f64::NAN)).validate().is_err());

        // Binary habits silently drop a goal
        let binary = details(false, Some(5.0)).validate().unwrap();
        assert_eq!(binary.goal_value, None);

        let untitled = HabitDetails {
            title: "  ".into(),
            ..Default::default()
        };
        assert!(untitled.validate().is_err());
    }

    fn stored_water() -> Habit {
        Habit {
            id: "h1".into(),
            user_id: "u1".into(),
            title: "Water".into(),
            category: "Health".into(),
            frequency: Frequency::Daily,
            start_time: Some("08:00".into()),
            end_time: None,
            unit: Some("glasses".into()),
            is_quantity: true,
            goal_value: Some(8.0),
            completed_dates: vec![CompletionEntry::with_value("2024-01-01", 3.0)],
            revision: 4,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_update_keeps_omitted_fields() {
        let update = HabitUpdate {
            title: Some("Hydrate".into()),
            ..Default::default()
        };

        let merged = update.apply_to(&stored_water()).unwrap();
        assert_eq!(merged.title, "Hydrate");
        assert_eq!(merged.category, "Health");
        assert!(merged.is_quantity);
        assert_eq!(merged.goal_value, Some(8.0));
        assert_eq!(merged.unit.as_deref(), Some("glasses"));
        assert_eq!(merged.start_time.as_deref(), Some("08:00"));
    }

    #[test]
    fn test_update_rejects_kind_change_with_history() {
        let update = HabitUpdate {
            is_quantity: Some(false),
            ..Default::default()
        };
        assert!(matches!(
            update.clone().apply_to(&stored_water()),
            Err(HabitError::KindMismatch { .. })
        ));

        let mut fresh = stored_water();
        fresh.completed_dates.clear();
        let merged = update.apply_to(&fresh).unwrap();
        assert!(!merged.is_quantity);
        assert_eq!(merged.goal_value, None);
    }

    #[test]
    fn test_update_validates_goal() {
        let update = HabitUpdate {
            goal_value: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(
            update.apply_to(&stored_water()),
            Err(HabitError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_progress_derives_level() {
        let progress = UserProgress::from_xp(250);
        assert_eq!(progress.xp(), 250);
        assert_eq!(progress.level(), 3);
    }

    #[test]
    fn test_user_serializes_derived_level() {
        let user = User {
            id: "u1".into(),
            email: "ada@example.com".into(),
            name: "Ada".into(),
            is_admin: false,
            progress: UserProgress::from_xp(120),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["xp"], serde_json::json!(120));
        assert_eq!(json["level"], serde_json::json!(2));
        assert_eq!(json["isAdmin"], serde_json::json!(false));
    }

    #[test]
    fn test_habit_serializes_camel_case() {
        let habit = Habit {
            id: "h1".into(),
            user_id: "u1".into(),
            title: "Water".into(),
            category: "Health".into(),
            frequency: Frequency::Daily,
            start_time: None,
            end_time: None,
            unit: Some("glasses".into()),
            is_quantity: true,
            goal_value: Some(8.0),
            completed_dates: vec![CompletionEntry::with_value("2024-01-01", 3.0)],
            revision: 1,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&habit).unwrap();
        assert_eq!(json["isQuantity"], serde_json::json!(true));
        assert_eq!(json["goalValue"], serde_json::json!(8.0));
        assert_eq!(json["completedDates"][0]["value"], serde_json::json!(3.0));
        assert_eq!(json["frequency"], serde_json::json!("daily"));
    }
}
