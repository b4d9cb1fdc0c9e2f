// Habit Tracker - Core Library
// Completion tracking, streaks and XP progression, used by the CLI and API server

pub mod entry;      // Completion entry codec
pub mod error;
pub mod model;
pub mod progress;   // Is a day done?
pub mod ledger;     // Toggle / set-value / remove
pub mod streak;
pub mod xp;
pub mod store;      // Persistence contract
pub mod db;         // SQLite store
pub mod tracker;    // Fetch -> ledger -> save -> grant
pub mod admin;
pub mod stats;
pub mod export;
pub mod config;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use entry::{decode, decode_list, encode, encode_list, parse_day, CompletionEntry};
pub use error::{HabitError, Result};
pub use model::{Frequency, Habit, HabitDetails, HabitUpdate, User, UserProgress};
pub use progress::{completion_state, is_completed, CompletionState};
pub use streak::{current_streak, overall_streak, streak};
pub use xp::{grant_if_newly_completed, level_for_xp, XP_PER_COMPLETION, XP_PER_LEVEL};
pub use store::{Event, HabitStore};
pub use db::SqliteStore;
pub use tracker::{HabitTracker, HabitView, ProgressOutcome};
pub use stats::{AdminStats, DashboardSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
