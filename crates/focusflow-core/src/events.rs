use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Phase, TimerMode};

/// Every state change of a `SessionTimer` produces an Event.
/// Hosts render from them; the driver forwards them over a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Timer state was restored from a snapshot on mount.
    Restored {
        mode: TimerMode,
        phase: Phase,
        remaining_secs: u64,
        planned_secs: u64,
        at: DateTime<Utc>,
    },
    TimerStarted {
        mode: TimerMode,
        phase: Phase,
        remaining_secs: u64,
        /// True when continuing an attempt that was paused.
        resumed: bool,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        credited_secs: u64,
        at: DateTime<Utc>,
    },
    /// Grace window ran out; only pause remains available.
    TimerLocked {
        at: DateTime<Utc>,
    },
    TimerReset {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        credited_secs: u64,
        at: DateTime<Utc>,
    },
    TimeAdjusted {
        planned_secs: u64,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseCompleted {
        from: Phase,
        to: Phase,
        cycles_completed: u32,
        at: DateTime<Utc>,
    },
    /// The session as a whole finished.
    SessionCompleted {
        mode: TimerMode,
        actual_secs: u64,
        at: DateTime<Utc>,
    },
    /// A session-log record was written.
    RecordSaved {
        duration_secs: u64,
        completed: bool,
        at: DateTime<Utc>,
    },
    /// Marking the task complete failed. Timer state is not rolled back.
    TaskCompletionFailed {
        task_id: String,
        message: String,
        at: DateTime<Utc>,
    },
}
