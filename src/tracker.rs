// 🎯 Habit Tracker Service
// Fetch -> ledger -> compare-and-swap save -> XP grant, per user action
//
// The ledger, evaluator and XP accumulator are pure. This is the one place
// where they meet the store. A save built from a stale read fails with
// `Conflict` instead of silently overwriting a concurrent change.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::entry::{format_day, parse_day, CompletionEntry};
use crate::error::{HabitError, Result};
use crate::ledger;
use crate::model::{Habit, HabitDetails, HabitUpdate, User};
use crate::progress::{completion_state, CompletionState};
use crate::stats::{dashboard_summary, DashboardSummary};
use crate::store::{Event, HabitStore};
use crate::streak::{streak, today_utc};
use crate::xp;

// ============================================================================
// RESPONSES
// ============================================================================

/// A habit as reported to callers: stored fields plus derived progress
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitView {
    #[serde(flatten)]
    pub habit: Habit,
    pub streak: u32,
    pub completed_today: bool,
    pub today_state: CompletionState,
}

/// Result of a completion change. `user` is `None` when no XP was granted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressOutcome {
    pub habit: HabitView,
    pub user: Option<User>,
}

// ============================================================================
// TRACKER
// ============================================================================

pub struct HabitTracker<S> {
    store: S,
    /// Fixed evaluation day; the current UTC day when unset
    today: Option<NaiveDate>,
    admin_email: Option<String>,
}

impl<S: HabitStore> HabitTracker<S> {
    pub fn new(store: S) -> Self {
        HabitTracker {
            store,
            today: None,
            admin_email: None,
        }
    }

    /// Evaluate streaks and "today" against a fixed day
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Users registering with this email become admins
    pub fn with_admin_email(mut self, email: impl Into<String>) -> Self {
        self.admin_email = Some(email.into());
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(today_utc)
    }

    pub fn view(&self, habit: Habit) -> Result<HabitView> {
        let today = self.today();
        let today_str = format_day(today);

        let streak = streak(&habit.completed_dates, &habit, today)?;
        let today_state = completion_state(&habit, habit.entry_for(&today_str));

        Ok(HabitView {
            habit,
            streak,
            completed_today: today_state.is_completed(),
            today_state,
        })
    }

    /// Habit owned by `user_id`. Someone else's habit is reported as missing.
    pub(crate) fn owned_habit(&self, habit_id: &str, user_id: &str) -> Result<Habit> {
        let habit = self.store.get_habit(habit_id)?;

        if !habit.is_owned_by(user_id) {
            return Err(HabitError::NotFound(format!("habit {}", habit_id)));
        }

        Ok(habit)
    }

    pub(crate) fn log_event(
        &self,
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) {
        let event = Event::new(event_type, entity_type, entity_id, data, actor);
        if let Err(e) = self.store.record_event(&event) {
            warn!(event_type, entity_id, error = %e, "failed to record event");
        }
    }

    // ========================================================================
    // COMPLETION CHANGES
    // ========================================================================

    /// Flip completion of `date` for a binary habit
    pub fn toggle_completion(
        &self,
        habit_id: &str,
        date: &str,
        user_id: &str,
    ) -> Result<ProgressOutcome> {
        parse_day(date)?;
        let habit = self.owned_habit(habit_id, user_id)?;

        if habit.is_quantity {
            return Err(HabitError::KindMismatch {
                kind: habit.kind(),
                operation: "toggle",
            });
        }

        let after = ledger::toggle(&habit.completed_dates, date);
        let present = after.iter().any(|e| e.date == date);

        let data = json!({ "date": date, "present": present });
        self.commit(habit, after, date, user_id, "completion_toggled", data)
    }

    /// Record cumulative progress on `date` for a quantitative habit
    pub fn set_progress(
        &self,
        habit_id: &str,
        date: &str,
        value: f64,
        user_id: &str,
    ) -> Result<ProgressOutcome> {
        parse_day(date)?;
        let habit = self.owned_habit(habit_id, user_id)?;

        if !habit.is_quantity {
            return Err(HabitError::KindMismatch {
                kind: habit.kind(),
                operation: "set progress",
            });
        }

        let after = ledger::set_value(&habit.completed_dates, date, value)?;

        let data = json!({ "date": date, "value": value });
        self.commit(habit, after, date, user_id, "progress_set", data)
    }

    /// Forget whatever was recorded on `date`. Never grants or revokes XP.
    pub fn clear_day(&self, habit_id: &str, date: &str, user_id: &str) -> Result<HabitView> {
        parse_day(date)?;
        let habit = self.owned_habit(habit_id, user_id)?;

        let after = ledger::remove(&habit.completed_dates, date);
        let data = json!({ "date": date });
        let outcome = self.commit(habit, after, date, user_id, "day_cleared", data)?;

        Ok(outcome.habit)
    }

    fn commit(
        &self,
        habit: Habit,
        after: Vec<CompletionEntry>,
        date: &str,
        user_id: &str,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<ProgressOutcome> {
        let user = self.store.get_user(user_id)?;
        let before = &habit.completed_dates;
        let grant = xp::grant_if_newly_completed(&habit, before, &after, date, &user);

        // Entries and XP land in one transaction
        let (saved, granted) = self.store.commit_progress(
            &habit.id,
            &after,
            habit.revision,
            grant.map(|progress| (user_id, progress)),
        )?;

        self.log_event(event_type, "habit", &habit.id, data, user_id);

        if let Some(updated) = &granted {
            info!(
                user_id,
                habit_id = %habit.id,
                date,
                xp = updated.xp(),
                level = updated.level(),
                "xp granted"
            );
            let data = json!({
                "habit_id": habit.id,
                "date": date,
                "xp": updated.xp(),
                "level": updated.level(),
            });
            self.log_event("xp_granted", "user", user_id, data, user_id);
        }

        Ok(ProgressOutcome {
            habit: self.view(saved)?,
            user: granted,
        })
    }

    // ========================================================================
    // USERS
    // ========================================================================

    pub fn register_user(&self, email: &str, name: &str) -> Result<User> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(HabitError::InvalidValue(format!("invalid email {:?}", email)));
        }

        let is_admin = self
            .admin_email
            .as_deref()
            .is_some_and(|admin| admin.eq_ignore_ascii_case(email));

        let user = self.store.create_user(email, name.trim(), is_admin)?;
        info!(user_id = %user.id, is_admin, "user registered");
        Ok(user)
    }

    pub fn user(&self, user_id: &str) -> Result<User> {
        self.store.get_user(user_id)
    }

    // ========================================================================
    // HABITS
    // ========================================================================

    pub fn create_habit(&self, user_id: &str, details: HabitDetails) -> Result<HabitView> {
        let details = details.validate()?;
        let habit = self.store.create_habit(user_id, &details)?;

        info!(habit_id = %habit.id, user_id, kind = habit.kind(), "habit created");
        let data = json!({ "title": habit.title });
        self.log_event("habit_created", "habit", &habit.id, data, user_id);

        self.view(habit)
    }

    /// Edit descriptive fields and goal; omitted fields keep their values
    pub fn update_habit(
        &self,
        habit_id: &str,
        user_id: &str,
        update: HabitUpdate,
    ) -> Result<HabitView> {
        let current = self.owned_habit(habit_id, user_id)?;
        let details = update.apply_to(&current)?;

        let habit = self.store.update_habit_details(habit_id, &details)?;
        info!(habit_id, user_id, "habit updated");
        self.view(habit)
    }

    pub fn delete_habit(&self, habit_id: &str, user_id: &str) -> Result<()> {
        self.owned_habit(habit_id, user_id)?;
        self.store.delete_habit(habit_id)?;

        info!(habit_id, user_id, "habit deleted");
        self.log_event("habit_deleted", "habit", habit_id, json!({}), user_id);
        Ok(())
    }

    pub fn habit(&self, habit_id: &str, user_id: &str) -> Result<HabitView> {
        let habit = self.owned_habit(habit_id, user_id)?;
        self.view(habit)
    }

    pub fn habits(&self, user_id: &str) -> Result<Vec<HabitView>> {
        self.store
            .list_habits(user_id)?
            .into_iter()
            .map(|h| self.view(h))
            .collect()
    }

    pub fn dashboard(&self, user_id: &str) -> Result<DashboardSummary> {
        self.store.get_user(user_id)?;
        let habits = self.store.list_habits(user_id)?;
        dashboard_summary(&habits, self.today())
    }
}
