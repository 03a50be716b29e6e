use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    Focus,
    Pomodoro,
}

impl TimerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerMode::Focus => "focus",
            TimerMode::Pomodoro => "pomodoro",
        }
    }
}

impl std::str::FromStr for TimerMode {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "focus" => Ok(TimerMode::Focus),
            "pomodoro" => Ok(TimerMode::Pomodoro),
            other => Err(crate::error::ValidationError::UnknownVariant {
                kind: "timer mode",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Work,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        !matches!(self, Phase::Work)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Work => "Work",
            Phase::ShortBreak => "Short Break",
            Phase::LongBreak => "Long Break",
        }
    }
}

/// Pomodoro cycling table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PomodoroSettings {
    pub work_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    /// A long break follows every n-th completed work phase.
    pub long_break_interval: u32,
    /// Completed work phases that finish the whole set.
    pub cycles_to_complete: u32,
    /// Keep running into the next phase instead of stopping at each boundary.
    pub auto_advance: bool,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            long_break_interval: 4,
            cycles_to_complete: 4,
            auto_advance: true,
        }
    }
}

/// Tunables shared by both modes. Defaults are the historical constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSettings {
    pub grace_period_secs: u32,
    pub persistence_threshold_secs: u64,
    pub snapshot_interval_secs: u64,
    pub snapshot_ttl_secs: u64,
    pub focus_min_minutes: u32,
    pub adjust_step_minutes: u32,
    pub pomodoro: PomodoroSettings,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            grace_period_secs: 10,
            persistence_threshold_secs: 300,
            snapshot_interval_secs: 15,
            snapshot_ttl_secs: 2 * 60 * 60,
            focus_min_minutes: 60,
            adjust_step_minutes: 5,
            pomodoro: PomodoroSettings::default(),
        }
    }
}

/// Focus sessions never plan less than this, whatever the config says.
pub const FOCUS_FLOOR_MINUTES: u32 = 60;

impl TimerSettings {
    /// Configured Focus minimum, raised to [`FOCUS_FLOOR_MINUTES`].
    pub fn focus_min_secs(&self) -> u64 {
        u64::from(self.focus_min_minutes.max(FOCUS_FLOOR_MINUTES)).saturating_mul(60)
    }

    /// Planned Focus duration for a task estimate, never below the minimum.
    pub fn focus_planned_secs(&self, estimated_minutes: Option<u32>) -> u64 {
        let estimate = u64::from(estimated_minutes.unwrap_or(0)).saturating_mul(60);
        estimate.max(self.focus_min_secs())
    }
}

/// What happens after a work phase finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    SetComplete,
    Break(Phase),
}

/// Mode-specific rules layered over the shared state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ModePolicy {
    Focus {
        grace_period_secs: u32,
        min_planned_secs: u64,
    },
    Pomodoro(PomodoroSettings),
}

impl ModePolicy {
    pub fn focus(settings: &TimerSettings) -> Self {
        ModePolicy::Focus {
            grace_period_secs: settings.grace_period_secs,
            min_planned_secs: settings.focus_min_secs(),
        }
    }

    pub fn pomodoro(settings: &TimerSettings) -> Self {
        ModePolicy::Pomodoro(settings.pomodoro.clone())
    }

    pub fn mode(&self) -> TimerMode {
        match self {
            ModePolicy::Focus { .. } => TimerMode::Focus,
            ModePolicy::Pomodoro(_) => TimerMode::Pomodoro,
        }
    }

    /// Grace window granted on every start. Pomodoro has none.
    pub fn grace_period_secs(&self) -> u32 {
        match self {
            ModePolicy::Focus {
                grace_period_secs, ..
            } => *grace_period_secs,
            ModePolicy::Pomodoro(_) => 0,
        }
    }

    /// Whether an expired grace window locks reset/stop/change-time.
    pub fn locks_after_grace(&self) -> bool {
        matches!(self, ModePolicy::Focus { .. })
    }

    pub fn allows_time_change(&self) -> bool {
        matches!(self, ModePolicy::Focus { .. })
    }

    pub fn min_planned_secs(&self) -> u64 {
        match self {
            ModePolicy::Focus {
                min_planned_secs, ..
            } => *min_planned_secs,
            ModePolicy::Pomodoro(_) => 0,
        }
    }

    pub fn auto_advance(&self) -> bool {
        match self {
            ModePolicy::Focus { .. } => false,
            ModePolicy::Pomodoro(p) => p.auto_advance,
        }
    }

    /// Full duration of a Pomodoro phase. `None` for Focus, whose length
    /// comes from the task.
    pub fn phase_secs(&self, phase: Phase) -> Option<u64> {
        match self {
            ModePolicy::Focus { .. } => None,
            ModePolicy::Pomodoro(p) => {
                let minutes = match phase {
                    Phase::Work => p.work_minutes,
                    Phase::ShortBreak => p.short_break_minutes,
                    Phase::LongBreak => p.long_break_minutes,
                };
                Some(u64::from(minutes).saturating_mul(60))
            }
        }
    }

    /// Decide what follows a work phase, given the already-incremented count.
    pub fn after_work(&self, cycles_completed: u32) -> WorkOutcome {
        match self {
            ModePolicy::Focus { .. } => WorkOutcome::SetComplete,
            ModePolicy::Pomodoro(p) => {
                if cycles_completed >= p.cycles_to_complete.max(1) {
                    WorkOutcome::SetComplete
                } else if p.long_break_interval > 0
                    && cycles_completed % p.long_break_interval == 0
                {
                    WorkOutcome::Break(Phase::LongBreak)
                } else {
                    WorkOutcome::Break(Phase::ShortBreak)
                }
            }
        }
    }
}
