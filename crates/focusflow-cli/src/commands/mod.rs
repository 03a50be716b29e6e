pub mod config;
pub mod focus;
pub mod pomodoro;
pub mod session;
pub mod stats;
pub mod task;
