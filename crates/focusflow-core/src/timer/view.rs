use serde::{Deserialize, Serialize};

use super::mode::{Phase, TimerMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    /// Running with no lock policy (Pomodoro).
    Running,
    /// Running inside the start-of-run grace window; every control works.
    Grace,
    /// Running after the grace window; only pause works.
    Locked,
    Completed,
}

impl TimerState {
    pub fn is_running(self) -> bool {
        matches!(self, TimerState::Running | TimerState::Grace | TimerState::Locked)
    }
}

/// Observable display state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerView {
    pub mode: TimerMode,
    pub state: TimerState,
    pub phase: Phase,
    pub phase_label: String,
    pub remaining_secs: u64,
    pub planned_secs: u64,
    /// `HH:MM:SS` for Focus, `MM:SS` for Pomodoro.
    pub display: String,
    pub percent_complete: f64,
    pub locked: bool,
    pub grace_remaining: u32,
    pub credited_secs: u64,
    pub cycles_completed: u32,
    pub session: u32,
}

/// `HH:MM:SS`.
pub fn format_hms(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// `MM:SS`; minutes keep counting past 59.
pub fn format_ms(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn format_clock(mode: TimerMode, secs: u64) -> String {
    match mode {
        TimerMode::Focus => format_hms(secs),
        TimerMode::Pomodoro => format_ms(secs),
    }
}

pub fn percent_complete(planned_secs: u64, remaining_secs: u64) -> f64 {
    if planned_secs == 0 {
        return 0.0;
    }
    let done = planned_secs.saturating_sub(remaining_secs) as f64;
    (done / planned_secs as f64 * 100.0).clamp(0.0, 100.0)
}
