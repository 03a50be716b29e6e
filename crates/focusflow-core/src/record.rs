//! Persisted shapes written by the timer: session-log records and the two
//! kinds of recovery snapshot.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Phase, TimerMode};

/// One entry in the session log.
///
/// Created on natural completion, or on pause/stop once the credited duration
/// has reached the persistence threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub mode: TimerMode,
    pub task_id: Option<String>,
    pub task_title: String,
    /// Credited wall-clock work time.
    pub duration_secs: u64,
    pub planned_duration_secs: u64,
    pub completed: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub stopped: bool,
    /// `duration / planned * 100`, only set for completed sessions.
    #[serde(default)]
    pub efficiency: Option<f64>,
    /// ISO day (`YYYY-MM-DD`, UTC).
    pub date: String,
    pub timestamp: DateTime<Utc>,
}

impl SessionRecord {
    pub fn day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }
}

/// Per-task recovery state for an in-progress Focus session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoverySnapshot {
    pub task_id: String,
    pub remaining_secs: u64,
    pub planned_secs: u64,
    #[serde(default)]
    pub accumulated_pause_ms: u64,
    #[serde(default)]
    pub session_started_at: Option<DateTime<Utc>>,
    /// Credited seconds already in the session log for this attempt.
    #[serde(default)]
    pub logged_secs: u64,
    pub saved_at: DateTime<Utc>,
}

impl RecoverySnapshot {
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.saved_at > ttl
    }
}

/// Last known Pomodoro position, restored on every mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PomodoroSnapshot {
    pub remaining_secs: u64,
    pub cycles_completed: u32,
    pub phase: Phase,
    pub session: u32,
    /// Credited work seconds of the finished work phases in this set.
    #[serde(default)]
    pub set_credited_secs: u64,
    #[serde(default)]
    pub last_stopped_at: Option<DateTime<Utc>>,
    pub saved_at: DateTime<Utc>,
}

/// Totals over a slice of session records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub sessions: u64,
    pub completed: u64,
    pub interrupted: u64,
    pub total_secs: u64,
}

impl SessionStats {
    pub fn from_records(records: &[SessionRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, r| {
            acc.sessions += 1;
            if r.completed {
                acc.completed += 1;
            } else {
                acc.interrupted += 1;
            }
            acc.total_secs += r.duration_secs;
            acc
        })
    }
}
