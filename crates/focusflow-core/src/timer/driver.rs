//! Background tick scheduling for a [`SessionTimer`].
//!
//! The engine is passive; this module owns the single periodic registration
//! that drives it. Every exit path (pause, stop, reset, completion, shutdown
//! and drop) cancels the registration, and arming always cancels the previous
//! one first, so a timer never has more than one live tick task.
//!
//! Must be used from inside a tokio runtime.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use super::engine::SessionTimer;
use super::view::TimerView;
use crate::events::Event;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Owner of at most one periodic tick task.
#[derive(Debug, Default)]
pub struct Ticker {
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any existing registration with one calling `on_tick` every
    /// `period`. The task ends by itself once `on_tick` returns false.
    pub fn arm<F>(&mut self, period: Duration, mut on_tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.disarm();
        self.task = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if !on_tick() {
                    break;
                }
            }
        }));
    }

    pub fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// User-facing controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Toggle,
    Reset,
    Stop,
    /// Minutes to add (negative to remove).
    ChangeTime(i64),
}

/// Runs a `SessionTimer` on a 1 Hz tokio interval and publishes its events.
pub struct TimerDriver {
    timer: Arc<Mutex<SessionTimer>>,
    ticker: Ticker,
    events: mpsc::UnboundedSender<Event>,
}

impl TimerDriver {
    pub fn new(timer: SessionTimer) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = Self {
            timer: Arc::new(Mutex::new(timer)),
            ticker: Ticker::new(),
            events: tx,
        };
        (driver, rx)
    }

    /// Restore persisted state; see [`SessionTimer::mount`].
    pub fn mount(&mut self) {
        let events = lock(&self.timer).mount();
        self.publish(events);
        self.sync_ticker();
    }

    /// Apply a control. Returns whether the timer accepted it.
    pub fn apply(&mut self, command: Command) -> bool {
        let events = {
            let mut timer = lock(&self.timer);
            match command {
                Command::Start => timer.start(),
                Command::Pause => timer.pause(),
                Command::Toggle => timer.toggle(),
                Command::Reset => timer.reset(),
                Command::Stop => timer.stop(),
                Command::ChangeTime(minutes) => timer.change_time(minutes),
            }
        };
        let accepted = !events.is_empty();
        self.publish(events);
        self.sync_ticker();
        accepted
    }

    pub fn view(&self) -> TimerView {
        lock(&self.timer).view()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_armed()
    }

    pub fn is_completed(&self) -> bool {
        lock(&self.timer).is_completed()
    }

    /// Run `f` against the timer under the lock.
    pub fn with_timer<R>(&self, f: impl FnOnce(&SessionTimer) -> R) -> R {
        f(&lock(&self.timer))
    }

    /// Cancel ticking and persist state for the next mount.
    pub fn shutdown(mut self) {
        self.ticker.disarm();
        lock(&self.timer).unmount();
    }

    fn publish(&self, events: Vec<Event>) {
        for event in events {
            // Receiver gone means nobody is rendering; the timer carries on.
            let _ = self.events.send(event);
        }
    }

    fn sync_ticker(&mut self) {
        let running = lock(&self.timer).is_running();
        if !running {
            self.ticker.disarm();
            return;
        }
        if self.ticker.is_armed() {
            return;
        }
        let timer = Arc::clone(&self.timer);
        let tx = self.events.clone();
        self.ticker.arm(TICK_PERIOD, move || {
            let (events, running) = {
                let mut timer = lock(&timer);
                let events = timer.tick();
                (events, timer.is_running())
            };
            for event in events {
                let _ = tx.send(event);
            }
            running
        });
    }
}

fn lock(timer: &Mutex<SessionTimer>) -> MutexGuard<'_, SessionTimer> {
    timer.lock().unwrap_or_else(|e| e.into_inner())
}
