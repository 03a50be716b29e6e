mod config;
pub mod database;
pub mod memory;

pub use config::{Config, PomodoroConfig, TimerConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns `~/.config/focusflow[-dev]/` based on FOCUSFLOW_ENV.
///
/// Set FOCUSFLOW_ENV=dev to use development data directory. FOCUSFLOW_HOME
/// overrides the location entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("FOCUSFLOW_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FOCUSFLOW_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focusflow-dev")
            } else {
                base_dir.join("focusflow")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
