//! Session timer engine.
//!
//! One countdown state machine serves both Focus and Pomodoro modes; the
//! differences live in [`ModePolicy`]. The engine owns no threads. The caller
//! (or [`super::TimerDriver`]) calls `tick()` once per second while running.
//!
//! ## State Transitions
//!
//! ```text
//! Focus:    Idle -> Grace -> Locked -> (Idle | Completed)
//!                     \-> Idle
//! Pomodoro: Idle <-> Running, Work -> ShortBreak/LongBreak -> Work ...,
//!           Completed after the configured number of work phases
//! ```
//!
//! The countdown is decremented once per tick, while the duration credited to
//! the session log is always recomputed from wall-clock deltas
//! (`now - session_started_at - accumulated_pause`), so throttled or
//! suspended hosts still log the real time worked.
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = SessionTimer::focus(task, TimerSettings::default(), ports);
//! timer.mount();
//! timer.start();
//! // Once per second:
//! for event in timer.tick() { /* render */ }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::mode::{ModePolicy, Phase, TimerMode, TimerSettings, WorkOutcome};
use super::view::{format_clock, percent_complete, TimerState, TimerView};
use crate::events::Event;
use crate::ports::{NoopHooks, Ports, SessionHooks};
use crate::record::{PomodoroSnapshot, RecoverySnapshot, SessionRecord};
use crate::task::Task;

/// Raw runtime state of one timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSession {
    pub mode: TimerMode,
    pub phase: Phase,
    pub planned_secs: u64,
    pub remaining_secs: u64,
    pub running: bool,
    /// Set once per attempt, on the first start.
    pub session_started_at: Option<DateTime<Utc>>,
    /// Open pause interval, closed by the next start.
    pub paused_at: Option<DateTime<Utc>>,
    pub accumulated_pause_ms: u64,
    pub grace_remaining: u32,
    pub cycles_completed: u32,
    /// Display-only Pomodoro counter, bumped after every break.
    pub session: u32,
    /// Credited seconds as of the last tick or command.
    pub credited_secs: u64,
    /// Credited seconds of this attempt already written to the session log.
    pub logged_secs: u64,
    /// Credited work seconds summed over finished Pomodoro work phases.
    pub set_credited_secs: u64,
    pub completed: bool,
}

impl TimerSession {
    fn new(mode: TimerMode, phase: Phase, planned_secs: u64) -> Self {
        Self {
            mode,
            phase,
            planned_secs,
            remaining_secs: planned_secs,
            running: false,
            session_started_at: None,
            paused_at: None,
            accumulated_pause_ms: 0,
            grace_remaining: 0,
            cycles_completed: 0,
            session: 1,
            credited_secs: 0,
            logged_secs: 0,
            set_credited_secs: 0,
            completed: false,
        }
    }

    fn clear_attempt(&mut self) {
        self.session_started_at = None;
        self.paused_at = None;
        self.accumulated_pause_ms = 0;
        self.credited_secs = 0;
        self.logged_secs = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Completed,
    Paused,
    Stopped,
}

/// Countdown state machine shared by Focus and Pomodoro.
pub struct SessionTimer {
    policy: ModePolicy,
    settings: TimerSettings,
    task: Option<Task>,
    session: TimerSession,
    ports: Ports,
    hooks: Box<dyn SessionHooks>,
    last_autosave_at: Option<DateTime<Utc>>,
    mounted: bool,
}

impl SessionTimer {
    /// Create a Focus timer for `task`. Planned time is
    /// `max(estimate, focus_min_minutes)`.
    pub fn focus(task: Task, settings: TimerSettings, ports: Ports) -> Self {
        let policy = ModePolicy::focus(&settings);
        let planned = settings.focus_planned_secs(task.estimated_minutes);
        Self {
            session: TimerSession::new(TimerMode::Focus, Phase::Work, planned),
            policy,
            settings,
            task: Some(task),
            ports,
            hooks: Box::new(NoopHooks),
            last_autosave_at: None,
            mounted: false,
        }
    }

    /// Create a Pomodoro timer positioned at the first work phase.
    pub fn pomodoro(settings: TimerSettings, ports: Ports) -> Self {
        let policy = ModePolicy::pomodoro(&settings);
        let planned = policy.phase_secs(Phase::Work).unwrap_or(0);
        Self {
            session: TimerSession::new(TimerMode::Pomodoro, Phase::Work, planned),
            policy,
            settings,
            task: None,
            ports,
            hooks: Box::new(NoopHooks),
            last_autosave_at: None,
            mounted: false,
        }
    }

    pub fn with_hooks(mut self, hooks: Box<dyn SessionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Attach a task to a Pomodoro set. Focus timers always carry one.
    pub fn with_task(mut self, task: Task) -> Self {
        self.task = Some(task);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn session(&self) -> &TimerSession {
        &self.session
    }

    pub fn mode(&self) -> TimerMode {
        self.policy.mode()
    }

    pub fn policy(&self) -> &ModePolicy {
        &self.policy
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.session.running
    }

    pub fn is_completed(&self) -> bool {
        self.session.completed
    }

    /// Running with the grace window spent, under a policy that locks.
    pub fn is_locked(&self) -> bool {
        self.policy.locks_after_grace()
            && self.session.running
            && self.session.grace_remaining == 0
    }

    pub fn state(&self) -> TimerState {
        if self.session.completed {
            TimerState::Completed
        } else if !self.session.running {
            TimerState::Idle
        } else if self.session.grace_remaining > 0 {
            TimerState::Grace
        } else if self.policy.locks_after_grace() {
            TimerState::Locked
        } else {
            TimerState::Running
        }
    }

    /// Wall-clock work time of the current attempt.
    pub fn credited_secs(&self) -> u64 {
        self.credited_secs_at(self.ports.clock.now())
    }

    pub fn view(&self) -> TimerView {
        let s = &self.session;
        TimerView {
            mode: s.mode,
            state: self.state(),
            phase: s.phase,
            phase_label: s.phase.label().to_string(),
            remaining_secs: s.remaining_secs,
            planned_secs: s.planned_secs,
            display: format_clock(s.mode, s.remaining_secs),
            percent_complete: percent_complete(s.planned_secs, s.remaining_secs),
            locked: self.is_locked(),
            grace_remaining: s.grace_remaining,
            credited_secs: self.credited_secs(),
            cycles_completed: s.cycles_completed,
            session: s.session,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Restore persisted state. Only the first call has any effect.
    ///
    /// Focus restores a matching, unexpired recovery snapshot; the interval
    /// the host was gone counts as paused time. Pomodoro restores its last
    /// position and fast-forwards by the time elapsed since the last stop,
    /// without crossing into the next phase.
    pub fn mount(&mut self) -> Vec<Event> {
        if self.mounted {
            return Vec::new();
        }
        self.mounted = true;
        let now = self.ports.clock.now();
        let restored = match self.policy.mode() {
            TimerMode::Focus => self.restore_focus(now),
            TimerMode::Pomodoro => self.restore_pomodoro(now),
        };
        if !restored {
            return Vec::new();
        }
        vec![Event::Restored {
            mode: self.session.mode,
            phase: self.session.phase,
            remaining_secs: self.session.remaining_secs,
            planned_secs: self.session.planned_secs,
            at: now,
        }]
    }

    /// Host teardown. Persists enough state for the next mount; fires no
    /// callbacks.
    pub fn unmount(&mut self) {
        if self.session.completed {
            return;
        }
        let now = self.ports.clock.now();
        match self.policy.mode() {
            TimerMode::Focus => {
                if self.session.running {
                    self.session.paused_at = Some(now);
                }
                self.save_recovery(now);
            }
            TimerMode::Pomodoro => {
                let mark = self.session.running.then_some(now);
                self.persist_pomodoro(mark, now);
            }
        }
        self.session.running = false;
        self.session.grace_remaining = 0;
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Idle -> running. Opens a new grace window every time.
    pub fn start(&mut self) -> Vec<Event> {
        if self.session.running || self.session.completed {
            return Vec::new();
        }
        let now = self.ports.clock.now();
        let resumed = match (self.session.session_started_at, self.session.paused_at.take()) {
            (None, _) => {
                self.session.session_started_at = Some(now);
                false
            }
            (Some(_), Some(paused_at)) => {
                self.session.accumulated_pause_ms += millis_between(paused_at, now);
                true
            }
            (Some(_), None) => true,
        };
        self.session.running = true;
        self.session.grace_remaining = self.policy.grace_period_secs();
        self.last_autosave_at = Some(now);
        if self.policy.mode() == TimerMode::Pomodoro {
            self.persist_pomodoro(None, now);
        }
        debug!(
            mode = self.session.mode.as_str(),
            remaining = self.session.remaining_secs,
            resumed,
            "timer started"
        );
        vec![Event::TimerStarted {
            mode: self.session.mode,
            phase: self.session.phase,
            remaining_secs: self.session.remaining_secs,
            resumed,
            at: now,
        }]
    }

    pub fn resume(&mut self) -> Vec<Event> {
        self.start()
    }

    /// Start/pause toggle.
    pub fn toggle(&mut self) -> Vec<Event> {
        if self.session.running {
            self.pause()
        } else {
            self.start()
        }
    }

    /// Always allowed while running, locked or not.
    pub fn pause(&mut self) -> Vec<Event> {
        if !self.session.running {
            return Vec::new();
        }
        let now = self.ports.clock.now();
        self.session.running = false;
        self.session.grace_remaining = 0;
        self.session.paused_at = Some(now);
        let credited = self.credited_secs_at(now);
        self.session.credited_secs = credited;

        let mut events = Vec::new();
        match self.policy.mode() {
            TimerMode::Focus => {
                if credited >= self.settings.persistence_threshold_secs {
                    events.extend(self.append_record(RecordKind::Paused, credited, now));
                }
                self.save_recovery(now);
            }
            TimerMode::Pomodoro => self.persist_pomodoro(None, now),
        }
        debug!(remaining = self.session.remaining_secs, credited, "timer paused");
        events.insert(
            0,
            Event::TimerPaused {
                remaining_secs: self.session.remaining_secs,
                credited_secs: credited,
                at: now,
            },
        );
        events
    }

    /// Restore the full duration of the current phase and forget the attempt.
    /// Ignored while locked.
    pub fn reset(&mut self) -> Vec<Event> {
        if self.session.completed || self.is_locked() {
            return Vec::new();
        }
        let now = self.ports.clock.now();
        if let Some(full) = self.policy.phase_secs(self.session.phase) {
            self.session.planned_secs = full;
        }
        self.session.remaining_secs = self.session.planned_secs;
        self.session.running = false;
        self.session.grace_remaining = 0;
        self.session.clear_attempt();
        match self.policy.mode() {
            TimerMode::Focus => self.clear_recovery(),
            TimerMode::Pomodoro => self.persist_pomodoro(None, now),
        }
        debug!(remaining = self.session.remaining_secs, "timer reset");
        vec![Event::TimerReset {
            remaining_secs: self.session.remaining_secs,
            at: now,
        }]
    }

    /// Exit the session view. Ignored while locked.
    pub fn stop(&mut self) -> Vec<Event> {
        if self.session.completed || self.is_locked() {
            return Vec::new();
        }
        let now = self.ports.clock.now();
        let was_running = self.session.running;
        let credited = self.credited_secs_at(now);
        let mut events = Vec::new();

        match self.policy.mode() {
            TimerMode::Focus => {
                if credited >= self.settings.persistence_threshold_secs {
                    events.extend(self.append_record(RecordKind::Stopped, credited, now));
                }
                self.clear_recovery();
                self.session.remaining_secs = self.session.planned_secs;
                self.session.clear_attempt();
            }
            TimerMode::Pomodoro => {
                self.persist_pomodoro(was_running.then_some(now), now);
                if was_running {
                    self.session.paused_at = Some(now);
                }
                self.session.credited_secs = credited;
            }
        }
        self.session.running = false;
        self.session.grace_remaining = 0;
        self.hooks.on_exit();
        debug!(credited, "timer stopped");
        events.insert(
            0,
            Event::TimerStopped {
                credited_secs: credited,
                at: now,
            },
        );
        events
    }

    /// Shift planned and remaining time by `delta_minutes`. Planned time never
    /// drops below the mode minimum. Ignored while locked and in Pomodoro.
    pub fn change_time(&mut self, delta_minutes: i64) -> Vec<Event> {
        if !self.policy.allows_time_change() || self.session.completed || self.is_locked() {
            return Vec::new();
        }
        let now = self.ports.clock.now();
        let min = self.policy.min_planned_secs() as i64;
        let planned = self.session.planned_secs as i64;
        let new_planned = (planned + delta_minutes.saturating_mul(60)).max(min);
        let applied = new_planned - planned;
        let shifted = self.session.remaining_secs as i64 + applied;
        // A shift that would empty the countdown leaves it where it is.
        let remaining = if shifted > 0 {
            shifted.min(new_planned)
        } else {
            (self.session.remaining_secs as i64).min(new_planned)
        };

        self.session.planned_secs = new_planned as u64;
        self.session.remaining_secs = remaining as u64;
        if self.session.session_started_at.is_some() {
            self.save_recovery(now);
        }
        debug!(
            planned = self.session.planned_secs,
            remaining = self.session.remaining_secs,
            "time adjusted"
        );
        vec![Event::TimeAdjusted {
            planned_secs: self.session.planned_secs,
            remaining_secs: self.session.remaining_secs,
            at: now,
        }]
    }

    /// Advance one second. Returns every event the second produced.
    pub fn tick(&mut self) -> Vec<Event> {
        if !self.session.running || self.session.completed {
            return Vec::new();
        }
        let now = self.ports.clock.now();
        let mut events = Vec::new();

        self.session.remaining_secs = self.session.remaining_secs.saturating_sub(1);
        self.session.credited_secs = self.credited_secs_at(now);

        if self.session.grace_remaining > 0 {
            self.session.grace_remaining -= 1;
            if self.session.grace_remaining == 0 && self.policy.locks_after_grace() {
                debug!("grace period over, controls locked");
                events.push(Event::TimerLocked { at: now });
            }
        }

        if self.session.remaining_secs == 0 {
            events.extend(self.finish_phase(now));
            return events;
        }

        let due = self.last_autosave_at.map_or(true, |last| {
            now - last >= Duration::seconds(self.settings.snapshot_interval_secs as i64)
        });
        if due {
            self.autosave(now);
        }
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn credited_secs_at(&self, now: DateTime<Utc>) -> u64 {
        let Some(started) = self.session.session_started_at else {
            return 0;
        };
        let mut elapsed_ms = millis_between(started, now);
        elapsed_ms = elapsed_ms.saturating_sub(self.session.accumulated_pause_ms);
        if let Some(paused_at) = self.session.paused_at {
            elapsed_ms = elapsed_ms.saturating_sub(millis_between(paused_at, now));
        }
        elapsed_ms / 1000
    }

    fn finish_phase(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        if self.policy.mode() == TimerMode::Focus {
            return self.complete_session(now);
        }

        let from = self.session.phase;
        let mut events = Vec::new();
        let next = match from {
            Phase::Work => {
                self.session.cycles_completed += 1;
                let credited = self.credited_secs_at(now);
                self.session.set_credited_secs += credited;
                events.extend(self.append_record(RecordKind::Completed, credited, now));
                match self.policy.after_work(self.session.cycles_completed) {
                    WorkOutcome::SetComplete => {
                        events.extend(self.complete_session(now));
                        return events;
                    }
                    WorkOutcome::Break(phase) => phase,
                }
            }
            Phase::ShortBreak | Phase::LongBreak => {
                self.session.session += 1;
                Phase::Work
            }
        };
        self.enter_phase(next, now);
        info!(
            from = from.label(),
            to = next.label(),
            cycles = self.session.cycles_completed,
            "phase completed"
        );
        events.push(Event::PhaseCompleted {
            from,
            to: next,
            cycles_completed: self.session.cycles_completed,
            at: now,
        });
        events
    }

    fn enter_phase(&mut self, phase: Phase, now: DateTime<Utc>) {
        let secs = self.policy.phase_secs(phase).unwrap_or(0);
        self.session.phase = phase;
        self.session.planned_secs = secs;
        self.session.remaining_secs = secs;
        self.session.clear_attempt();
        if self.policy.auto_advance() && self.session.running {
            self.session.session_started_at = Some(now);
        } else {
            self.session.running = false;
        }
        self.last_autosave_at = Some(now);
        self.persist_pomodoro(None, now);
    }

    fn complete_session(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let actual = match self.policy.mode() {
            TimerMode::Focus => self.credited_secs_at(now),
            TimerMode::Pomodoro => self.session.set_credited_secs,
        };
        let mut events = Vec::new();

        self.session.running = false;
        self.session.grace_remaining = 0;
        self.session.remaining_secs = 0;
        self.session.credited_secs = actual;
        self.session.completed = true;

        match self.policy.mode() {
            TimerMode::Focus => {
                events.extend(self.append_record(RecordKind::Completed, actual, now));
                self.clear_recovery();
            }
            TimerMode::Pomodoro => {
                if let Err(e) = self.ports.snapshots.clear_pomodoro() {
                    warn!(error = %e, "failed to clear pomodoro state");
                }
            }
        }

        if let Some(task) = &self.task {
            if let Err(e) = self.ports.tasks.complete_task(&task.id) {
                warn!(task_id = %task.id, error = %e, "failed to mark task complete");
                events.push(Event::TaskCompletionFailed {
                    task_id: task.id.clone(),
                    message: e.to_string(),
                    at: now,
                });
            }
        }

        info!(mode = self.session.mode.as_str(), actual, "session completed");
        self.hooks.on_complete(actual);
        events.insert(
            0,
            Event::SessionCompleted {
                mode: self.session.mode,
                actual_secs: actual,
                at: now,
            },
        );
        events
    }

    /// Log the part of `credited` not yet written for this attempt, so
    /// repeated pauses never count the same seconds twice.
    fn append_record(&mut self, kind: RecordKind, credited: u64, now: DateTime<Utc>) -> Option<Event> {
        let duration_secs = credited.saturating_sub(self.session.logged_secs);
        if duration_secs == 0 {
            return None;
        }
        let planned = self.session.planned_secs;
        let completed = kind == RecordKind::Completed;
        let efficiency = (completed && planned > 0)
            .then(|| (credited as f64 / planned as f64 * 100.0).round());
        let record = SessionRecord {
            mode: self.session.mode,
            task_id: self.task.as_ref().map(|t| t.id.clone()),
            task_title: self
                .task
                .as_ref()
                .map(|t| t.title.clone())
                .unwrap_or_else(|| default_title(self.session.mode).to_string()),
            duration_secs,
            planned_duration_secs: planned,
            completed,
            paused: kind == RecordKind::Paused,
            stopped: kind == RecordKind::Stopped,
            efficiency,
            date: now.format("%Y-%m-%d").to_string(),
            timestamp: now,
        };
        match self.ports.log.append(&record) {
            Ok(()) => {
                self.session.logged_secs = credited;
                info!(duration_secs, completed, "session record saved");
                Some(Event::RecordSaved {
                    duration_secs,
                    completed,
                    at: now,
                })
            }
            Err(e) => {
                warn!(error = %e, "failed to append session record");
                None
            }
        }
    }

    fn autosave(&mut self, now: DateTime<Utc>) {
        match self.policy.mode() {
            TimerMode::Focus => self.save_recovery(now),
            TimerMode::Pomodoro => self.persist_pomodoro(None, now),
        }
    }

    fn save_recovery(&mut self, now: DateTime<Utc>) {
        let Some(task) = &self.task else { return };
        if self.session.session_started_at.is_none() {
            return;
        }
        let snapshot = RecoverySnapshot {
            task_id: task.id.clone(),
            remaining_secs: self.session.remaining_secs,
            planned_secs: self.session.planned_secs,
            accumulated_pause_ms: self.session.accumulated_pause_ms,
            session_started_at: self.session.session_started_at,
            logged_secs: self.session.logged_secs,
            saved_at: now,
        };
        if let Err(e) = self.ports.snapshots.save_recovery(&snapshot) {
            warn!(task_id = %task.id, error = %e, "failed to save recovery snapshot");
        }
        self.last_autosave_at = Some(now);
    }

    fn clear_recovery(&self) {
        let Some(task) = &self.task else { return };
        if let Err(e) = self.ports.snapshots.clear_recovery(&task.id) {
            warn!(task_id = %task.id, error = %e, "failed to clear recovery snapshot");
        }
    }

    fn persist_pomodoro(&mut self, last_stopped_at: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        let snapshot = PomodoroSnapshot {
            remaining_secs: self.session.remaining_secs,
            cycles_completed: self.session.cycles_completed,
            phase: self.session.phase,
            session: self.session.session,
            set_credited_secs: self.session.set_credited_secs,
            last_stopped_at,
            saved_at: now,
        };
        if let Err(e) = self.ports.snapshots.save_pomodoro(&snapshot) {
            warn!(error = %e, "failed to save pomodoro state");
        }
        self.last_autosave_at = Some(now);
    }

    fn restore_focus(&mut self, now: DateTime<Utc>) -> bool {
        let Some(task_id) = self.task.as_ref().map(|t| t.id.clone()) else {
            return false;
        };
        let snapshot = match self.ports.snapshots.load_recovery(&task_id) {
            Ok(Some(s)) if s.task_id == task_id => s,
            Ok(_) => return false,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "failed to load recovery snapshot");
                return false;
            }
        };
        let ttl = Duration::seconds(self.settings.snapshot_ttl_secs as i64);
        if snapshot.is_expired(now, ttl) {
            debug!(task_id = %task_id, saved_at = %snapshot.saved_at, "discarding expired recovery snapshot");
            self.clear_recovery();
            return false;
        }

        let planned = snapshot.planned_secs.max(self.policy.min_planned_secs());
        self.session.planned_secs = planned;
        self.session.remaining_secs = snapshot.remaining_secs.min(planned);
        self.session.accumulated_pause_ms = snapshot.accumulated_pause_ms;
        self.session.session_started_at = snapshot.session_started_at;
        self.session.logged_secs = snapshot.logged_secs;
        self.session.paused_at = snapshot.session_started_at.map(|_| snapshot.saved_at);
        self.session.credited_secs = self.credited_secs_at(now);
        info!(task_id = %task_id, remaining = self.session.remaining_secs, "restored focus session");
        true
    }

    fn restore_pomodoro(&mut self, now: DateTime<Utc>) -> bool {
        let snapshot = match self.ports.snapshots.load_pomodoro() {
            Ok(Some(s)) => s,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "failed to load pomodoro state");
                return false;
            }
        };
        let planned = self.policy.phase_secs(snapshot.phase).unwrap_or(0);
        self.session.phase = snapshot.phase;
        self.session.planned_secs = planned;
        self.session.remaining_secs = snapshot.remaining_secs.min(planned);
        self.session.cycles_completed = snapshot.cycles_completed;
        self.session.session = snapshot.session.max(1);
        self.session.set_credited_secs = snapshot.set_credited_secs;

        if let Some(stopped_at) = snapshot.last_stopped_at {
            let away = millis_between(stopped_at, now) / 1000;
            self.session.remaining_secs = self.session.remaining_secs.saturating_sub(away);
            debug!(away_secs = away, "fast-forwarded pomodoro countdown");
            // Consume the mark so a second mount does not subtract again.
            self.persist_pomodoro(None, now);
        }
        info!(
            phase = self.session.phase.label(),
            remaining = self.session.remaining_secs,
            "restored pomodoro state"
        );
        true
    }
}

impl std::fmt::Debug for SessionTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTimer")
            .field("policy", &self.policy)
            .field("task", &self.task)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn default_title(mode: TimerMode) -> &'static str {
    match mode {
        TimerMode::Focus => "Focus session",
        TimerMode::Pomodoro => "Pomodoro",
    }
}

fn millis_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::clock::ManualClock;
    use crate::ports::{SessionLog, SnapshotStore};
    use crate::record::SessionStats;
    use crate::storage::MemoryStore;

    #[derive(Clone, Default)]
    struct Calls {
        completed: Arc<Mutex<Vec<u64>>>,
        exits: Arc<AtomicUsize>,
    }

    impl SessionHooks for Calls {
        fn on_complete(&mut self, actual_elapsed_secs: u64) {
            self.completed.lock().unwrap().push(actual_elapsed_secs);
        }
        fn on_exit(&mut self) {
            self.exits.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
        calls: Calls,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                clock: Arc::new(ManualClock::default()),
                store: Arc::new(MemoryStore::new()),
                calls: Calls::default(),
            }
        }

        fn ports(&self) -> Ports {
            Ports::from_store(self.store.clone(), self.clock.clone())
        }

        fn focus(&self, estimate: Option<u32>) -> SessionTimer {
            let mut task = Task::new("task-1", "Write report");
            task.estimated_minutes = estimate;
            self.store.insert_task(task.clone());
            SessionTimer::focus(task, TimerSettings::default(), self.ports())
                .with_hooks(Box::new(self.calls.clone()))
        }

        fn pomodoro(&self) -> SessionTimer {
            SessionTimer::pomodoro(TimerSettings::default(), self.ports())
                .with_hooks(Box::new(self.calls.clone()))
        }

        /// Advance the clock one second and tick, `n` times.
        fn run(&self, timer: &mut SessionTimer, n: u64) -> Vec<Event> {
            let mut events = Vec::new();
            for _ in 0..n {
                self.clock.advance_secs(1);
                events.extend(timer.tick());
            }
            events
        }
    }

    #[test]
    fn focus_estimate_is_floored_at_an_hour() {
        let h = Harness::new();
        let timer = h.focus(Some(30));
        assert_eq!(timer.session().planned_secs, 3600);
        assert_eq!(timer.session().remaining_secs, 3600);
    }

    #[test]
    fn grace_expires_after_ten_ticks_and_locks() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        assert_eq!(timer.state(), TimerState::Grace);
        assert_eq!(timer.session().grace_remaining, 10);

        h.run(&mut timer, 9);
        assert_eq!(timer.session().grace_remaining, 1);
        assert!(!timer.is_locked());

        let events = h.run(&mut timer, 1);
        assert!(events.iter().any(|e| matches!(e, Event::TimerLocked { .. })));
        assert_eq!(timer.state(), TimerState::Locked);

        h.run(&mut timer, 5);
        assert_eq!(timer.session().grace_remaining, 0);
    }

    #[test]
    fn stop_is_ignored_once_locked() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 11);
        let before = timer.session().clone();

        assert!(timer.stop().is_empty());
        assert!(timer.reset().is_empty());
        assert!(timer.change_time(5).is_empty());
        assert_eq!(timer.session(), &before);
        assert_eq!(h.calls.exits.load(Ordering::SeqCst), 0);

        h.run(&mut timer, 1);
        assert_eq!(timer.session().remaining_secs, before.remaining_secs - 1);
    }

    #[test]
    fn pause_is_always_available_when_locked() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 30);
        assert!(timer.is_locked());
        assert!(!timer.pause().is_empty());
        assert_eq!(timer.state(), TimerState::Idle);
        assert!(!timer.reset().is_empty());
    }

    #[test]
    fn controls_work_during_grace() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 3);
        assert!(!timer.change_time(5).is_empty());
        assert_eq!(timer.session().planned_secs, 3900);
        assert_eq!(timer.session().remaining_secs, 3897);
        assert!(!timer.reset().is_empty());
        assert_eq!(timer.session().remaining_secs, 3900);
        assert!(!timer.is_running());
    }

    #[test]
    fn change_time_never_goes_below_minimum() {
        let h = Harness::new();
        let mut timer = h.focus(Some(70));
        timer.change_time(-5);
        assert_eq!(timer.session().planned_secs, 3900);
        timer.change_time(-5);
        timer.change_time(-5);
        assert_eq!(timer.session().planned_secs, 3600);
        assert_eq!(timer.session().remaining_secs, 3600);
    }

    #[test]
    fn short_pause_writes_no_record() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 299);
        timer.pause();
        assert!(h.store.all_records().is_empty());
    }

    #[test]
    fn pause_after_400s_writes_one_paused_record() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 400);
        let events = timer.pause();
        assert!(events.iter().any(|e| matches!(e, Event::RecordSaved { .. })));

        let records = h.store.all_records();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.duration_secs, 400);
        assert!(!r.completed);
        assert!(r.paused);
        assert_eq!(r.task_id.as_deref(), Some("task-1"));
        assert_eq!(r.efficiency, None);
    }

    #[test]
    fn paused_time_is_not_credited() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 100);
        timer.pause();
        h.clock.advance_secs(1000);
        assert_eq!(timer.session().remaining_secs, 3500);
        assert_eq!(timer.credited_secs(), 100);

        let events = timer.start();
        assert!(matches!(events[0], Event::TimerStarted { resumed: true, .. }));
        assert_eq!(timer.session().accumulated_pause_ms, 1_000_000);
        assert_eq!(timer.session().grace_remaining, 10);
        h.run(&mut timer, 50);
        assert_eq!(timer.credited_secs(), 150);
    }

    #[test]
    fn credited_time_follows_wall_clock_when_ticks_are_throttled() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        // Host slept: 600 real seconds, only one tick delivered.
        h.clock.advance_secs(600);
        timer.tick();
        assert_eq!(timer.session().remaining_secs, 3599);
        assert_eq!(timer.session().credited_secs, 600);
        timer.pause();
        assert_eq!(h.store.all_records()[0].duration_secs, 600);
    }

    #[test]
    fn stop_during_grace_exits_without_record() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 5);
        assert!(!timer.stop().is_empty());
        assert!(h.store.all_records().is_empty());
        assert_eq!(h.calls.exits.load(Ordering::SeqCst), 1);
        assert!(h.store.load_recovery("task-1").unwrap().is_none());
    }

    #[test]
    fn stop_in_grace_past_threshold_writes_stopped_record() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 299);
        timer.pause();
        assert!(h.store.all_records().is_empty());

        timer.start();
        h.run(&mut timer, 5);
        assert!(!timer.is_locked());
        timer.stop();
        let records = h.store.all_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].stopped);
        assert_eq!(records[0].duration_secs, 304);
    }

    #[test]
    fn stop_after_logged_pause_adds_no_duplicate_time() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 350);
        timer.pause();
        timer.stop();
        let records = h.store.all_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].paused);
        assert_eq!(records[0].duration_secs, 350);
        assert_eq!(SessionStats::from_records(&records).total_secs, 350);
        assert_eq!(timer.session().remaining_secs, 3600);
        assert!(h.store.load_recovery("task-1").unwrap().is_none());
    }

    #[test]
    fn repeated_pauses_log_each_second_once() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 350);
        timer.pause();
        h.clock.advance_secs(60);
        timer.start();
        h.run(&mut timer, 100);
        timer.pause();
        timer.stop();

        let records = h.store.all_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].duration_secs, 350);
        assert_eq!(records[1].duration_secs, 100);
        let stats = SessionStats::from_records(&records);
        assert_eq!(stats.total_secs, 450);
        assert_eq!(stats.interrupted, 2);
    }

    #[test]
    fn logged_time_survives_recovery() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 400);
        timer.pause();
        timer.unmount();

        let mut again = h.focus(None);
        again.mount();
        assert_eq!(again.session().logged_secs, 400);
        again.start();
        h.run(&mut again, 50);
        again.pause();

        let records = h.store.all_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].duration_secs, 50);
        assert_eq!(SessionStats::from_records(&records).total_secs, 450);
    }

    #[test]
    fn change_time_never_empties_the_countdown() {
        let h = Harness::new();
        let mut timer = h.focus(Some(70));
        timer.start();
        h.run(&mut timer, 4000);
        timer.pause();
        assert_eq!(timer.session().remaining_secs, 200);

        let events = timer.change_time(-5);
        assert!(!events.is_empty());
        assert_eq!(timer.session().planned_secs, 3900);
        assert_eq!(timer.session().remaining_secs, 200);

        timer.start();
        h.run(&mut timer, 1);
        assert!(!timer.is_completed());
        assert!(h.calls.completed.lock().unwrap().is_empty());
    }

    #[test]
    fn natural_completion_fires_once_and_logs() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        let events = h.run(&mut timer, 3600);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::SessionCompleted { actual_secs: 3600, .. })));
        assert_eq!(timer.state(), TimerState::Completed);
        assert_eq!(*h.calls.completed.lock().unwrap(), vec![3600]);

        // Terminal: nothing else moves.
        assert!(h.run(&mut timer, 5).is_empty());
        assert!(timer.start().is_empty());
        assert_eq!(h.calls.completed.lock().unwrap().len(), 1);

        let records = h.store.all_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].completed);
        assert_eq!(records[0].efficiency, Some(100.0));
        assert!(h.store.task_completed("task-1"));
        assert!(h.store.load_recovery("task-1").unwrap().is_none());
    }

    #[test]
    fn task_store_failure_does_not_roll_back_completion() {
        let h = Harness::new();
        h.store.set_fail_task_updates(true);
        let mut timer = h.focus(None);
        timer.start();
        let events = h.run(&mut timer, 3600);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::TaskCompletionFailed { .. })));
        assert!(timer.is_completed());
        assert_eq!(h.calls.completed.lock().unwrap().len(), 1);
    }

    #[test]
    fn log_failure_is_swallowed() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 400);
        h.store.set_fail_writes(true);
        let events = timer.pause();
        assert_eq!(events.len(), 1);
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[test]
    fn recovery_snapshot_written_every_fifteen_seconds() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 14);
        assert!(h.store.load_recovery("task-1").unwrap().is_none());
        h.run(&mut timer, 1);
        let snap = h.store.load_recovery("task-1").unwrap().unwrap();
        assert_eq!(snap.remaining_secs, 3585);
        assert_eq!(snap.planned_secs, 3600);
    }

    #[test]
    fn mount_restores_matching_snapshot() {
        let h = Harness::new();
        let mut timer = h.focus(Some(90));
        timer.start();
        h.run(&mut timer, 600);
        timer.unmount();

        h.clock.advance_secs(1800);
        let mut again = h.focus(Some(90));
        let events = again.mount();
        assert!(matches!(events[0], Event::Restored { .. }));
        assert_eq!(again.session().planned_secs, 5400);
        assert_eq!(again.session().remaining_secs, 4800);
        assert_eq!(again.credited_secs(), 600);
        assert!(again.mount().is_empty());

        again.start();
        h.run(&mut again, 10);
        assert_eq!(again.credited_secs(), 610);
    }

    #[test]
    fn expired_snapshot_is_discarded() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 60);
        timer.unmount();

        h.clock.advance_secs(2 * 60 * 60 + 1);
        let mut again = h.focus(None);
        assert!(again.mount().is_empty());
        assert_eq!(again.session().remaining_secs, 3600);
        assert!(h.store.load_recovery("task-1").unwrap().is_none());
    }

    #[test]
    fn pomodoro_four_cycles_complete_without_final_break() {
        let h = Harness::new();
        let mut timer = h.pomodoro();
        timer.start();

        for cycle in 1..=3 {
            let events = h.run(&mut timer, 1500);
            assert!(events.iter().any(|e| matches!(
                e,
                Event::PhaseCompleted { from: Phase::Work, to: Phase::ShortBreak, .. }
            )));
            assert_eq!(timer.session().cycles_completed, cycle);
            assert_eq!(timer.session().phase, Phase::ShortBreak);
            assert_eq!(timer.session().remaining_secs, 300);
            h.run(&mut timer, 300);
            assert_eq!(timer.session().phase, Phase::Work);
            assert_eq!(timer.session().session, cycle + 1);
        }

        let events = h.run(&mut timer, 1500);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::SessionCompleted { actual_secs: 6000, .. })));
        assert!(!events.iter().any(|e| matches!(e, Event::PhaseCompleted { .. })));
        assert_eq!(timer.session().cycles_completed, 4);
        assert_eq!(timer.session().phase, Phase::Work);
        assert_eq!(*h.calls.completed.lock().unwrap(), vec![6000]);
        assert!(h.run(&mut timer, 10).is_empty());
        assert_eq!(h.store.records(TimerMode::Pomodoro).unwrap().len(), 4);
        assert!(h.store.load_pomodoro().unwrap().is_none());
    }

    #[test]
    fn pomodoro_set_total_survives_a_restart() {
        let h = Harness::new();
        let mut timer = h.pomodoro();
        timer.start();
        h.run(&mut timer, 3 * 1800);
        assert_eq!(timer.session().cycles_completed, 3);
        assert_eq!(timer.session().phase, Phase::Work);
        assert_eq!(timer.session().set_credited_secs, 4500);
        timer.pause();
        timer.unmount();

        let mut again = h.pomodoro();
        again.mount();
        assert_eq!(again.session().set_credited_secs, 4500);
        assert_eq!(again.session().remaining_secs, 1500);
        again.start();
        let events = h.run(&mut again, 1500);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::SessionCompleted { actual_secs: 6000, .. })));
        assert_eq!(*h.calls.completed.lock().unwrap(), vec![6000]);
    }

    #[test]
    fn pomodoro_has_no_lock() {
        let h = Harness::new();
        let mut timer = h.pomodoro();
        timer.start();
        assert_eq!(timer.state(), TimerState::Running);
        h.run(&mut timer, 60);
        assert!(!timer.is_locked());
        assert!(!timer.reset().is_empty());
        assert_eq!(timer.session().remaining_secs, 1500);
    }

    #[test]
    fn pomodoro_stop_fast_forwards_on_next_mount() {
        let h = Harness::new();
        let mut timer = h.pomodoro();
        timer.start();
        h.run(&mut timer, 100);
        timer.stop();
        assert_eq!(h.calls.exits.load(Ordering::SeqCst), 1);

        h.clock.advance_secs(200);
        let mut again = h.pomodoro();
        again.mount();
        assert_eq!(again.session().remaining_secs, 1200);
        assert_eq!(again.session().phase, Phase::Work);

        // The mark is consumed.
        let mut third = h.pomodoro();
        third.mount();
        assert_eq!(third.session().remaining_secs, 1200);
    }

    #[test]
    fn pomodoro_fast_forward_does_not_cross_phases() {
        let h = Harness::new();
        let mut timer = h.pomodoro();
        timer.start();
        h.run(&mut timer, 10);
        timer.stop();
        h.clock.advance_secs(5000);
        let mut again = h.pomodoro();
        again.mount();
        assert_eq!(again.session().remaining_secs, 0);
        assert_eq!(again.session().phase, Phase::Work);
    }

    #[test]
    fn pomodoro_pause_persists_position() {
        let h = Harness::new();
        let mut timer = h.pomodoro();
        timer.start();
        h.run(&mut timer, 42);
        timer.pause();
        let snap = h.store.load_pomodoro().unwrap().unwrap();
        assert_eq!(snap.remaining_secs, 1458);
        assert_eq!(snap.last_stopped_at, None);
        assert!(h.store.all_records().is_empty());
    }

    #[test]
    fn remaining_unchanged_while_idle() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        h.run(&mut timer, 20);
        assert_eq!(timer.session().remaining_secs, 3600);
        timer.start();
        h.run(&mut timer, 20);
        timer.pause();
        h.run(&mut timer, 20);
        assert_eq!(timer.session().remaining_secs, 3580);
    }

    #[test]
    fn view_reports_display_state() {
        let h = Harness::new();
        let mut timer = h.focus(None);
        timer.start();
        h.run(&mut timer, 1800);
        let view = timer.view();
        assert_eq!(view.display, "00:30:00");
        assert_eq!(view.percent_complete, 50.0);
        assert!(view.locked);
        assert_eq!(view.state, TimerState::Locked);
    }
}
