//! Collaborator interfaces the timer depends on.
//!
//! The host application owns the implementations. `storage::Database` backs
//! them with SQLite and `storage::MemoryStore` keeps everything in memory.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::record::{PomodoroSnapshot, RecoverySnapshot, SessionRecord};
use crate::storage::MemoryStore;
use crate::timer::TimerMode;

/// Append-only log of past timer sessions, one collection per mode.
pub trait SessionLog: Send + Sync {
    fn append(&self, record: &SessionRecord) -> Result<()>;

    fn records(&self, mode: TimerMode) -> Result<Vec<SessionRecord>>;

    /// Records whose `date` falls in `[from, to]`, oldest first.
    fn records_between(
        &self,
        mode: Option<TimerMode>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SessionRecord>>;
}

/// Local key/value storage for recovery state.
pub trait SnapshotStore: Send + Sync {
    fn save_recovery(&self, snapshot: &RecoverySnapshot) -> Result<()>;
    fn load_recovery(&self, task_id: &str) -> Result<Option<RecoverySnapshot>>;
    fn clear_recovery(&self, task_id: &str) -> Result<()>;

    fn save_pomodoro(&self, snapshot: &PomodoroSnapshot) -> Result<()>;
    fn load_pomodoro(&self) -> Result<Option<PomodoroSnapshot>>;
    fn clear_pomodoro(&self) -> Result<()>;
}

/// The slice of the task store the timer calls into.
pub trait TaskStore: Send + Sync {
    fn complete_task(&self, task_id: &str) -> Result<()>;
}

/// Host callbacks.
pub trait SessionHooks: Send {
    /// Fires exactly once per session, on natural completion.
    fn on_complete(&mut self, actual_elapsed_secs: u64);

    /// Fires when the user stops/exits the session view.
    fn on_exit(&mut self);
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl SessionHooks for NoopHooks {
    fn on_complete(&mut self, _actual_elapsed_secs: u64) {}
    fn on_exit(&mut self) {}
}

/// Bundle of shared collaborators handed to a `SessionTimer`.
#[derive(Clone)]
pub struct Ports {
    pub clock: Arc<dyn Clock>,
    pub log: Arc<dyn SessionLog>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub tasks: Arc<dyn TaskStore>,
}

impl Ports {
    /// Wire every port to one store implementing all three storage traits.
    pub fn from_store<S>(store: Arc<S>, clock: Arc<dyn Clock>) -> Self
    where
        S: SessionLog + SnapshotStore + TaskStore + 'static,
    {
        Self {
            clock,
            log: store.clone(),
            snapshots: store.clone(),
            tasks: store,
        }
    }

    /// Fresh in-memory ports on the system clock.
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for Ports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ports").finish_non_exhaustive()
    }
}
