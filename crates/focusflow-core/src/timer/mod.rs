mod driver;
mod engine;
mod mode;
mod view;

pub use driver::{Command, Ticker, TimerDriver, TICK_PERIOD};
pub use engine::{SessionTimer, TimerSession};
pub use mode::{ModePolicy, Phase, PomodoroSettings, TimerMode, TimerSettings, WorkOutcome};
pub use view::{format_clock, format_hms, format_ms, percent_complete, TimerState, TimerView};
