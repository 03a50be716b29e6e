//! SQLite-backed storage.
//!
//! Provides persistent storage for:
//! - The session log (one row per persisted session record)
//! - Tasks the Focus timer is attached to
//! - Key-value store for recovery snapshots

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::data_dir;
use crate::error::{CoreError, DatabaseError, Result};
use crate::ports::{SessionLog, SnapshotStore, TaskStore};
use crate::record::{PomodoroSnapshot, RecoverySnapshot, SessionRecord};
use crate::task::Task;
use crate::timer::TimerMode;

const RECOVERY_PREFIX: &str = "focus_recovery:";
const POMODORO_KEY: &str = "pomodoro_state";

/// SQLite database implementing every storage port.
///
/// The connection sits behind a mutex so one handle can be shared between
/// the timer and the host.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `<data_dir>/focusflow.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("focusflow.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Database(DatabaseError::Poisoned))
    }

    fn migrate(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id                    INTEGER PRIMARY KEY AUTOINCREMENT,
                mode                  TEXT NOT NULL,
                task_id               TEXT,
                task_title            TEXT NOT NULL DEFAULT '',
                duration_secs         INTEGER NOT NULL,
                planned_duration_secs INTEGER NOT NULL,
                completed             INTEGER NOT NULL,
                paused                INTEGER NOT NULL DEFAULT 0,
                stopped               INTEGER NOT NULL DEFAULT 0,
                efficiency            REAL,
                date                  TEXT NOT NULL,
                timestamp             TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id                TEXT PRIMARY KEY,
                title             TEXT NOT NULL,
                description       TEXT,
                estimated_minutes INTEGER,
                completed         INTEGER NOT NULL DEFAULT 0,
                created_at        TEXT NOT NULL,
                completed_at      TEXT
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_mode_date ON sessions(mode, date);
            CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(date);",
        )?;
        Ok(())
    }

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn create_task(&self, task: &Task) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO tasks (id, title, description, estimated_minutes, completed, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task.id,
                task.title,
                task.description,
                task.estimated_minutes,
                task.completed,
                task.created_at.to_rfc3339(),
                task.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let conn = self.conn()?;
        let task = conn
            .query_row(
                "SELECT id, title, description, estimated_minutes, completed, created_at, completed_at
                 FROM tasks WHERE id = ?1",
                params![id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    pub fn list_tasks(&self, include_completed: bool) -> Result<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, description, estimated_minutes, completed, created_at, completed_at
             FROM tasks
             WHERE ?1 OR completed = 0
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![include_completed], row_to_task)?;
        let tasks = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Overwrite title, description and estimate. Completion state is left to
    /// `complete_task`.
    pub fn update_task(&self, task: &Task) -> Result<()> {
        let n = self.conn()?.execute(
            "UPDATE tasks SET title = ?2, description = ?3, estimated_minutes = ?4 WHERE id = ?1",
            params![task.id, task.title, task.description, task.estimated_minutes],
        )?;
        if n == 0 {
            return Err(CoreError::TaskNotFound(task.id.clone()));
        }
        Ok(())
    }

    /// Returns whether a row was deleted.
    pub fn delete_task(&self, id: &str) -> Result<bool> {
        let n = self
            .conn()?
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn kv_get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kv_get(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn kv_set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.kv_set(key, &serde_json::to_string(value)?)
    }
}

impl SessionLog for Database {
    fn append(&self, record: &SessionRecord) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO sessions (mode, task_id, task_title, duration_secs, planned_duration_secs,
                                   completed, paused, stopped, efficiency, date, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.mode.as_str(),
                record.task_id,
                record.task_title,
                record.duration_secs,
                record.planned_duration_secs,
                record.completed,
                record.paused,
                record.stopped,
                record.efficiency,
                record.date,
                record.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn records(&self, mode: TimerMode) -> Result<Vec<SessionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT mode, task_id, task_title, duration_secs, planned_duration_secs,
                    completed, paused, stopped, efficiency, date, timestamp
             FROM sessions
             WHERE mode = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![mode.as_str()], row_to_record)?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn records_between(
        &self,
        mode: Option<TimerMode>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SessionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT mode, task_id, task_title, duration_secs, planned_duration_secs,
                    completed, paused, stopped, efficiency, date, timestamp
             FROM sessions
             WHERE (?1 IS NULL OR mode = ?1) AND date >= ?2 AND date <= ?3
             ORDER BY timestamp",
        )?;
        let rows = stmt.query_map(
            params![
                mode.map(TimerMode::as_str),
                from.format("%Y-%m-%d").to_string(),
                to.format("%Y-%m-%d").to_string(),
            ],
            row_to_record,
        )?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

impl SnapshotStore for Database {
    fn save_recovery(&self, snapshot: &RecoverySnapshot) -> Result<()> {
        self.kv_set_json(&format!("{RECOVERY_PREFIX}{}", snapshot.task_id), snapshot)
    }

    fn load_recovery(&self, task_id: &str) -> Result<Option<RecoverySnapshot>> {
        self.kv_get_json(&format!("{RECOVERY_PREFIX}{task_id}"))
    }

    fn clear_recovery(&self, task_id: &str) -> Result<()> {
        self.kv_delete(&format!("{RECOVERY_PREFIX}{task_id}"))
    }

    fn save_pomodoro(&self, snapshot: &PomodoroSnapshot) -> Result<()> {
        self.kv_set_json(POMODORO_KEY, snapshot)
    }

    fn load_pomodoro(&self) -> Result<Option<PomodoroSnapshot>> {
        self.kv_get_json(POMODORO_KEY)
    }

    fn clear_pomodoro(&self) -> Result<()> {
        self.kv_delete(POMODORO_KEY)
    }
}

impl TaskStore for Database {
    fn complete_task(&self, task_id: &str) -> Result<()> {
        let n = self.conn()?.execute(
            "UPDATE tasks SET completed = 1, completed_at = ?2 WHERE id = ?1",
            params![task_id, Utc::now().to_rfc3339()],
        )?;
        if n == 0 {
            return Err(CoreError::TaskNotFound(task_id.to_string()));
        }
        Ok(())
    }
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let mode: String = row.get(0)?;
    let mode = mode
        .parse::<TimerMode>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    let timestamp: String = row.get(10)?;
    Ok(SessionRecord {
        mode,
        task_id: row.get(1)?,
        task_title: row.get(2)?,
        duration_secs: row.get(3)?,
        planned_duration_secs: row.get(4)?,
        completed: row.get(5)?,
        paused: row.get(6)?,
        stopped: row.get(7)?,
        efficiency: row.get(8)?,
        date: row.get(9)?,
        timestamp: parse_ts(10, &timestamp)?,
    })
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let created_at: String = row.get(5)?;
    let completed_at: Option<String> = row.get(6)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        estimated_minutes: row.get(3)?,
        completed: row.get(4)?,
        created_at: parse_ts(5, &created_at)?,
        completed_at: completed_at.as_deref().map(|s| parse_ts(6, s)).transpose()?,
    })
}
