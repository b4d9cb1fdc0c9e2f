// 🗄️ Store Contract
// What the tracker needs from a habit/user persistence layer
//
// Entry-list updates are compare-and-swap on the habit revision: a save
// built from a stale read fails with `Conflict` and writes nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::CompletionEntry;
use crate::error::Result;
use crate::model::{Habit, HabitDetails, User, UserProgress};

/// Audit trail record ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub trait HabitStore {
    // ------------------------------------------------------------------------
    // Completion engine collaborator
    // ------------------------------------------------------------------------

    fn get_habit(&self, id: &str) -> Result<Habit>;

    /// Replace the entry list if the stored revision still equals
    /// `expected_revision`; bumps the revision on success.
    fn save_habit(
        &self,
        id: &str,
        entries: &[CompletionEntry],
        expected_revision: i64,
    ) -> Result<Habit>;

    /// `save_habit` plus the owner's new progress, atomically. Either both
    /// writes land or neither does; `grant` of `None` leaves the user alone.
    fn commit_progress(
        &self,
        habit_id: &str,
        entries: &[CompletionEntry],
        expected_revision: i64,
        grant: Option<(&str, UserProgress)>,
    ) -> Result<(Habit, Option<User>)>;

    fn get_user(&self, id: &str) -> Result<User>;

    fn save_user(&self, id: &str, progress: UserProgress) -> Result<User>;

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    /// Fails with `Conflict` when the email is already registered
    fn create_user(&self, email: &str, name: &str, is_admin: bool) -> Result<User>;

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Newest first
    fn list_users(&self) -> Result<Vec<User>>;

    /// Deletes the user and all of their habits, returns the habit count removed
    fn delete_user(&self, id: &str) -> Result<usize>;

    // ------------------------------------------------------------------------
    // Habits
    // ------------------------------------------------------------------------

    /// New habit with an empty history
    fn create_habit(&self, user_id: &str, details: &HabitDetails) -> Result<Habit>;

    fn update_habit_details(&self, id: &str, details: &HabitDetails) -> Result<Habit>;

    fn list_habits(&self, user_id: &str) -> Result<Vec<Habit>>;

    fn list_all_habits(&self) -> Result<Vec<Habit>>;

    fn delete_habit(&self, id: &str) -> Result<()>;

    fn count_habits(&self, user_id: &str) -> Result<usize>;

    // ------------------------------------------------------------------------
    // Audit trail
    // ------------------------------------------------------------------------

    fn record_event(&self, event: &Event) -> Result<()>;

    /// Newest first
    fn events_for(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>>;
}
