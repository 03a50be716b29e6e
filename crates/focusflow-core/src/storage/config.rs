//! TOML-based application configuration.
//!
//! Stores the timer tunables:
//! - Grace period, persistence threshold and snapshot cadence
//! - Focus minimum duration and the adjust-time step
//! - Pomodoro phase lengths and cycle counts
//!
//! Configuration is stored at `~/.config/focusflow/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::timer::{PomodoroSettings, TimerSettings};

/// Timer behaviour shared by both modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u32,
    #[serde(default = "default_persistence_threshold_secs")]
    pub persistence_threshold_secs: u64,
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: u64,
    #[serde(default = "default_focus_min_minutes")]
    pub focus_min_minutes: u32,
    #[serde(default = "default_adjust_step_minutes")]
    pub adjust_step_minutes: u32,
}

/// Pomodoro cycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroConfig {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    #[serde(default = "default_cycles")]
    pub long_break_interval: u32,
    #[serde(default = "default_cycles")]
    pub cycles_to_complete: u32,
    #[serde(default = "default_true")]
    pub auto_advance: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/focusflow/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub pomodoro: PomodoroConfig,
}

// Default functions
fn default_grace_period_secs() -> u32 {
    10
}
fn default_persistence_threshold_secs() -> u64 {
    300
}
fn default_snapshot_interval_secs() -> u64 {
    15
}
fn default_snapshot_ttl_secs() -> u64 {
    2 * 60 * 60
}
fn default_focus_min_minutes() -> u32 {
    60
}
fn default_adjust_step_minutes() -> u32 {
    5
}
fn default_work_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_cycles() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
            persistence_threshold_secs: default_persistence_threshold_secs(),
            snapshot_interval_secs: default_snapshot_interval_secs(),
            snapshot_ttl_secs: default_snapshot_ttl_secs(),
            focus_min_minutes: default_focus_min_minutes(),
            adjust_step_minutes: default_adjust_step_minutes(),
        }
    }
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            long_break_interval: default_cycles(),
            cycles_to_complete: default_cycles(),
            auto_advance: true,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => value
                    .parse::<bool>()
                    .map(serde_json::Value::Bool)
                    .map_err(|e| invalid(e.to_string()))?,
                serde_json::Value::Number(_) => value
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?,
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
                .into()
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory only.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json)?;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Engine-facing settings.
    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings {
            grace_period_secs: self.timer.grace_period_secs,
            persistence_threshold_secs: self.timer.persistence_threshold_secs,
            snapshot_interval_secs: self.timer.snapshot_interval_secs.max(1),
            snapshot_ttl_secs: self.timer.snapshot_ttl_secs,
            focus_min_minutes: self.timer.focus_min_minutes,
            adjust_step_minutes: self.timer.adjust_step_minutes,
            pomodoro: PomodoroSettings {
                work_minutes: self.pomodoro.work_minutes,
                short_break_minutes: self.pomodoro.short_break_minutes,
                long_break_minutes: self.pomodoro.long_break_minutes,
                long_break_interval: self.pomodoro.long_break_interval,
                cycles_to_complete: self.pomodoro.cycles_to_complete,
                auto_advance: self.pomodoro.auto_advance,
            },
        }
    }
}
