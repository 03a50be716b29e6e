//! # Focusflow Core Library
//!
//! Core logic for the Focusflow productivity tool: a task list paired with
//! Focus and Pomodoro countdown timers.
//!
//! ## Architecture
//!
//! - **Timer Engine**: one wall-clock-aware countdown state machine,
//!   parameterized per mode. The caller (or [`TimerDriver`]) invokes `tick()`
//!   once per second.
//! - **Ports**: the engine only talks to traits ([`SessionLog`],
//!   [`SnapshotStore`], [`TaskStore`], [`Clock`], [`SessionHooks`]) so hosts
//!   choose the storage.
//! - **Storage**: SQLite-backed [`Database`], an in-memory [`MemoryStore`] and
//!   TOML-based [`Config`].
//!
//! ## Key Components
//!
//! - [`SessionTimer`]: the state machine
//! - [`TimerDriver`]: tokio tick scheduling around a timer
//! - [`Database`]: session log, tasks and recovery snapshots

pub mod clock;
pub mod error;
pub mod events;
pub mod ports;
pub mod record;
pub mod storage;
pub mod task;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use ports::{NoopHooks, Ports, SessionHooks, SessionLog, SnapshotStore, TaskStore};
pub use record::{PomodoroSnapshot, RecoverySnapshot, SessionRecord, SessionStats};
pub use storage::{Config, Database, MemoryStore};
pub use task::Task;
pub use timer::{
    Command, ModePolicy, Phase, SessionTimer, TimerDriver, TimerMode, TimerSettings, TimerState,
    TimerView,
};
