use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, warn};

use crate::entry::{decode_list, encode_list, CompletionEntry};
use crate::error::{HabitError, Result};
use crate::model::{Frequency, Habit, HabitDetails, User, UserProgress};
use crate::store::{Event, HabitStore};

const HABIT_COLUMNS: &str = "id, user_id, title, category, frequency, start_time, end_time,
     is_quantity, goal_value, unit, completed_dates, revision, created_at";

const USER_COLUMNS: &str = "id, email, name, is_admin, xp, level, created_at";

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Users
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            xp INTEGER NOT NULL DEFAULT 0,
            level INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Habits (completion history kept as a JSON array)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS habits (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            category TEXT NOT NULL,
            frequency TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            is_quantity INTEGER NOT NULL DEFAULT 0,
            goal_value REAL,
            unit TEXT,
            completed_dates TEXT NOT NULL DEFAULT '[]',
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_habits_user ON habits(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

/// Raw habit row, before the completion history is decoded
struct HabitRow {
    id: String,
    user_id: String,
    title: String,
    category: String,
    frequency: String,
    start_time: Option<String>,
    end_time: Option<String>,
    is_quantity: bool,
    goal_value: Option<f64>,
    unit: Option<String>,
    completed_dates: String,
    revision: i64,
    created_at: DateTime<Utc>,
}

impl HabitRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(HabitRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            category: row.get(3)?,
            frequency: row.get(4)?,
            start_time: row.get(5)?,
            end_time: row.get(6)?,
            is_quantity: row.get(7)?,
            goal_value: row.get(8)?,
            unit: row.get(9)?,
            completed_dates: row.get(10)?,
            revision: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    fn into_habit(self) -> Result<Habit> {
        let completed_dates = decode_list(&self.completed_dates).map_err(|e| {
            warn!(habit_id = %self.id, error = %e, "corrupt completion history");
            e
        })?;

        let frequency = Frequency::parse(&self.frequency).unwrap_or_else(|| {
            warn!(
                habit_id = %self.id,
                frequency = %self.frequency,
                "unknown frequency, using daily"
            );
            Frequency::Daily
        });

        Ok(Habit {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            category: self.category,
            frequency,
            start_time: self.start_time,
            end_time: self.end_time,
            unit: self.unit,
            is_quantity: self.is_quantity,
            goal_value: self.goal_value,
            completed_dates,
            revision: self.revision,
            created_at: self.created_at,
        })
    }
}

/// The stored `level` column is informational; the level is re-derived from XP
fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let xp: i64 = row.get(4)?;

    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        is_admin: row.get(3)?,
        progress: UserProgress::from_xp(xp.max(0) as u64),
        created_at: row.get(6)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// `HabitStore` backed by a single SQLite connection
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    fn query_habits(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Habit>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, HabitRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(HabitRow::into_habit).collect()
    }
}

impl HabitStore for SqliteStore {
    fn get_habit(&self, id: &str) -> Result<Habit> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM habits WHERE id = ?1", HABIT_COLUMNS),
                [id],
                HabitRow::from_row,
            )
            .optional()?;

        match row {
            Some(row) => row.into_habit(),
            None => Err(HabitError::NotFound(format!("habit {}", id))),
        }
    }

    fn save_habit(
        &self,
        id: &str,
        entries: &[CompletionEntry],
        expected_revision: i64,
    ) -> Result<Habit> {
        let (habit, _) = self.commit_progress(id, entries, expected_revision, None)?;
        Ok(habit)
    }

    fn commit_progress(
        &self,
        habit_id: &str,
        entries: &[CompletionEntry],
        expected_revision: i64,
        grant: Option<(&str, UserProgress)>,
    ) -> Result<(Habit, Option<User>)> {
        let encoded = encode_list(entries)?;
        let tx = self.conn.unchecked_transaction()?;

        let changed = tx.execute(
            "UPDATE habits
             SET completed_dates = ?1, revision = revision + 1
             WHERE id = ?2 AND revision = ?3",
            params![encoded, habit_id, expected_revision],
        )?;

        if changed == 0 {
            // Distinguish a missing habit from a lost race
            let current = self.get_habit(habit_id)?;
            warn!(
                habit_id,
                expected_revision,
                actual_revision = current.revision,
                "stale habit revision"
            );
            return Err(HabitError::Conflict(format!(
                "habit {} changed concurrently (expected revision {}, found {})",
                habit_id, expected_revision, current.revision
            )));
        }

        if let Some((user_id, progress)) = grant {
            let changed = tx.execute(
                "UPDATE users SET xp = ?1, level = ?2 WHERE id = ?3",
                params![progress.xp() as i64, progress.level() as i64, user_id],
            )?;

            // Dropping the transaction rolls the habit update back too
            if changed == 0 {
                return Err(HabitError::NotFound(format!("user {}", user_id)));
            }
        }

        tx.commit()?;
        debug!(
            habit_id,
            entries = entries.len(),
            granted = grant.is_some(),
            "progress committed"
        );

        let habit = self.get_habit(habit_id)?;
        let user = match grant {
            Some((user_id, _)) => Some(self.get_user(user_id)?),
            None => None,
        };

        Ok((habit, user))
    }

    fn get_user(&self, id: &str) -> Result<User> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                [id],
                user_from_row,
            )
            .optional()?
            .ok_or_else(|| HabitError::NotFound(format!("user {}", id)))
    }

    fn save_user(&self, id: &str, progress: UserProgress) -> Result<User> {
        let changed = self.conn.execute(
            "UPDATE users SET xp = ?1, level = ?2 WHERE id = ?3",
            params![progress.xp() as i64, progress.level() as i64, id],
        )?;

        if changed == 0 {
            return Err(HabitError::NotFound(format!("user {}", id)));
        }

        self.get_user(id)
    }

    fn create_user(&self, email: &str, name: &str, is_admin: bool) -> Result<User> {
        let id = uuid::Uuid::new_v4().to_string();
        let start = UserProgress::from_xp(0);

        let result = self.conn.execute(
            "INSERT INTO users (id, email, name, is_admin, xp, level, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                email,
                name,
                is_admin,
                start.xp() as i64,
                start.level() as i64,
                Utc::now()
            ],
        );

        match result {
            Ok(_) => self.get_user(&id),
            Err(e) if is_constraint_violation(&e) => Err(HabitError::Conflict(format!(
                "email {} is already registered",
                email
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM users WHERE lower(email) = lower(?1)",
                    USER_COLUMNS
                ),
                [email],
                user_from_row,
            )
            .optional()?)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC",
            USER_COLUMNS
        ))?;

        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(users)
    }

    fn delete_user(&self, id: &str) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;

        let habits = tx.execute("DELETE FROM habits WHERE user_id = ?1", [id])?;
        let users = tx.execute("DELETE FROM users WHERE id = ?1", [id])?;

        if users == 0 {
            return Err(HabitError::NotFound(format!("user {}", id)));
        }

        tx.commit()?;
        Ok(habits)
    }

    fn create_habit(&self, user_id: &str, details: &HabitDetails) -> Result<Habit> {
        // Owner must exist
        self.get_user(user_id)?;

        let id = uuid::Uuid::new_v4().to_string();

        self.conn.execute(
            "INSERT INTO habits (
                id, user_id, title, category, frequency, start_time, end_time,
                is_quantity, goal_value, unit, completed_dates, revision, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, '[]', 0, ?11)",
            params![
                id,
                user_id,
                details.title,
                details.category,
                details.frequency.as_str(),
                details.start_time,
                details.end_time,
                details.is_quantity,
                details.goal_value,
                details.unit,
                Utc::now(),
            ],
        )?;

        self.get_habit(&id)
    }

    fn update_habit_details(&self, id: &str, details: &HabitDetails) -> Result<Habit> {
        let changed = self.conn.execute(
            "UPDATE habits
             SET title = ?1, category = ?2, frequency = ?3, start_time = ?4,
                 end_time = ?5, is_quantity = ?6, goal_value = ?7, unit = ?8
             WHERE id = ?9",
            params![
                details.title,
                details.category,
                details.frequency.as_str(),
                details.start_time,
                details.end_time,
                details.is_quantity,
                details.goal_value,
                details.unit,
                id,
            ],
        )?;

        if changed == 0 {
            return Err(HabitError::NotFound(format!("habit {}", id)));
        }

        self.get_habit(id)
    }

    fn list_habits(&self, user_id: &str) -> Result<Vec<Habit>> {
        self.query_habits(
            &format!(
                "SELECT {} FROM habits WHERE user_id = ?1 ORDER BY created_at, id",
                HABIT_COLUMNS
            ),
            &[&user_id],
        )
    }

    fn list_all_habits(&self) -> Result<Vec<Habit>> {
        self.query_habits(
            &format!("SELECT {} FROM habits ORDER BY created_at, id", HABIT_COLUMNS),
            &[],
        )
    }

    fn delete_habit(&self, id: &str) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM habits WHERE id = ?1", [id])?;

        if changed == 0 {
            return Err(HabitError::NotFound(format!("habit {}", id)));
        }

        Ok(())
    }

    fn count_habits(&self, user_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM habits WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    /// Insert event into audit trail
    fn record_event(&self, event: &Event) -> Result<()> {
        let data_json = serde_json::to_string(&event.data)?;

        self.conn.execute(
            "INSERT INTO events (
                event_id, timestamp, event_type, entity_type, entity_id, data, actor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.event_id,
                event.timestamp,
                event.event_type,
                event.entity_type,
                event.entity_id,
                data_json,
                event.actor,
            ],
        )?;

        Ok(())
    }

    fn events_for(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
             FROM events
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY timestamp DESC, id DESC",
        )?;

        let rows = stmt
            .query_map(params![entity_type, entity_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, DateTime<Utc>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|row| -> Result<Event> {
                let (event_id, timestamp, event_type, entity_type, entity_id, data, actor) = row;
                Ok(Event {
                    event_id,
                    timestamp,
                    event_type,
                    entity_type,
                    entity_id,
                    data: serde_json::from_str(&data)?,
                    actor,
                })
            })
            .collect()
    }
}
