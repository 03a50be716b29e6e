//! In-memory implementation of every storage port.
//!
//! Used by tests and by hosts that do not want anything on disk. Write
//! failures can be switched on to exercise the best-effort paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, Utc};

use crate::error::{CoreError, Result};
use crate::ports::{SessionLog, SnapshotStore, TaskStore};
use crate::record::{PomodoroSnapshot, RecoverySnapshot, SessionRecord};
use crate::task::Task;
use crate::timer::TimerMode;

#[derive(Debug, Default)]
struct Inner {
    records: Vec<SessionRecord>,
    recovery: HashMap<String, RecoverySnapshot>,
    pomodoro: Option<PomodoroSnapshot>,
    tasks: HashMap<String, Task>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
    fail_task_updates: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_task(&self, task: Task) {
        self.lock().tasks.insert(task.id.clone(), task);
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.lock().tasks.get(id).cloned()
    }

    pub fn task_completed(&self, id: &str) -> bool {
        self.task(id).is_some_and(|t| t.completed)
    }

    /// Every record in append order, both modes.
    pub fn all_records(&self) -> Vec<SessionRecord> {
        self.lock().records.clone()
    }

    /// Make every session-log and snapshot write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `complete_task` fail.
    pub fn set_fail_task_updates(&self, fail: bool) {
        self.fail_task_updates.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory store is read-only",
            )));
        }
        Ok(())
    }
}

impl SessionLog for MemoryStore {
    fn append(&self, record: &SessionRecord) -> Result<()> {
        self.check_writable()?;
        self.lock().records.push(record.clone());
        Ok(())
    }

    fn records(&self, mode: TimerMode) -> Result<Vec<SessionRecord>> {
        Ok(self
            .lock()
            .records
            .iter()
            .filter(|r| r.mode == mode)
            .cloned()
            .collect())
    }

    fn records_between(
        &self,
        mode: Option<TimerMode>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SessionRecord>> {
        let mut out: Vec<SessionRecord> = self
            .lock()
            .records
            .iter()
            .filter(|r| mode.map_or(true, |m| r.mode == m))
            .filter(|r| r.day().is_some_and(|d| d >= from && d <= to))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.timestamp);
        Ok(out)
    }
}

impl SnapshotStore for MemoryStore {
    fn save_recovery(&self, snapshot: &RecoverySnapshot) -> Result<()> {
        self.check_writable()?;
        self.lock()
            .recovery
            .insert(snapshot.task_id.clone(), snapshot.clone());
        Ok(())
    }

    fn load_recovery(&self, task_id: &str) -> Result<Option<RecoverySnapshot>> {
        Ok(self.lock().recovery.get(task_id).cloned())
    }

    fn clear_recovery(&self, task_id: &str) -> Result<()> {
        self.lock().recovery.remove(task_id);
        Ok(())
    }

    fn save_pomodoro(&self, snapshot: &PomodoroSnapshot) -> Result<()> {
        self.check_writable()?;
        self.lock().pomodoro = Some(snapshot.clone());
        Ok(())
    }

    fn load_pomodoro(&self) -> Result<Option<PomodoroSnapshot>> {
        Ok(self.lock().pomodoro.clone())
    }

    fn clear_pomodoro(&self) -> Result<()> {
        self.lock().pomodoro = None;
        Ok(())
    }
}

impl TaskStore for MemoryStore {
    fn complete_task(&self, task_id: &str) -> Result<()> {
        if self.fail_task_updates.load(Ordering::SeqCst) {
            return Err(CoreError::Custom("task store unavailable".into()));
        }
        let mut inner = self.lock();
        let task = inner
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))?;
        task.completed = true;
        task.completed_at = Some(Utc::now());
        Ok(())
    }
}
