// 📊 Progress Statistics
// Per-user dashboard summary and global admin counters

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::entry::format_day;
use crate::error::Result;
use crate::model::{Habit, User};
use crate::progress::is_completed_on;
use crate::streak::{overall_streak, streak};

/// Streak length at which a habit counts as "on fire"
pub const ON_FIRE_STREAK: u32 = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_habits: usize,
    pub completed_today: usize,
    /// 0-100, share of habits completed today
    pub completion_percent: f64,
    /// Consecutive days with at least one completed habit
    pub overall_streak: u32,
    pub best_streak: u32,
    pub habits_on_fire: usize,
}

pub fn dashboard_summary(habits: &[Habit], today: NaiveDate) -> Result<DashboardSummary> {
    let today_str = format_day(today);

    let completed_today = habits
        .iter()
        .filter(|h| is_completed_on(h, &h.completed_dates, &today_str))
        .count();

    let streaks = habits
        .iter()
        .map(|h| streak(&h.completed_dates, h, today))
        .collect::<Result<Vec<_>>>()?;

    let completion_percent = if habits.is_empty() {
        0.0
    } else {
        completed_today as f64 / habits.len() as f64 * 100.0
    };

    Ok(DashboardSummary {
        total_habits: habits.len(),
        completed_today,
        completion_percent,
        overall_streak: overall_streak(habits, today)?,
        best_streak: streaks.iter().copied().max().unwrap_or(0),
        habits_on_fire: streaks.iter().filter(|s| **s >= ON_FIRE_STREAK).count(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: usize,
    pub total_habits: usize,
    /// Habits completed today, across all users
    pub completed_today: usize,
    /// Users who completed at least one habit today or yesterday
    pub active_users: usize,
}

pub fn admin_stats(users: &[User], habits: &[Habit], today: NaiveDate) -> AdminStats {
    let today_str = format_day(today);
    let yesterday_str = today.pred_opt().map(format_day);

    let completed_today = habits
        .iter()
        .filter(|h| is_completed_on(h, &h.completed_dates, &today_str))
        .count();

    let active: HashSet<&str> = habits
        .iter()
        .filter(|h| {
            is_completed_on(h, &h.completed_dates, &today_str)
                || yesterday_str
                    .as_deref()
                    .is_some_and(|y| is_completed_on(h, &h.completed_dates, y))
        })
        .map(|h| h.user_id.as_str())
        .collect();

    AdminStats {
        total_users: users.len(),
        total_habits: habits.len(),
        completed_today,
        active_users: active.len(),
    }
}
