//! TOML-based application configuration.
//!
//! Stores the tracker thresholds and the participant roster:
//! - Sampling and detection thresholds (tick interval, detection window,
//!   activity minimums, best-window length, attempt duration)
//! - Tracked channel ids and correction badge definitions
//! - Teams, aliases, and nicknames
//!
//! Configuration is stored at `~/.config/coliseum/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;
use crate::roster::{ChannelId, ParticipantId, RosterConfig};

/// A designated non-participant correction signal: a message from `source`
/// containing `keyword` (case-insensitive) marks the last valid count as a
/// mistake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionBadge {
    pub source: ParticipantId,
    pub keyword: String,
}

/// Tracker thresholds. Every field has a default mirroring the live
/// deployment values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Sampler tick interval in seconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// How many recent senders to inspect when detecting a two-person pair.
    #[serde(default = "default_detection_window")]
    pub detection_window_size: usize,

    /// Minimum combined counts a pair must produce over the check window.
    #[serde(default = "default_min_activity")]
    pub min_activity_count: u64,

    /// Age at which an underactive pair run gets its one-shot warning.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold_secs: u64,

    /// Age at which the full inactivity rule applies to a pair run.
    #[serde(default = "default_check_threshold")]
    pub check_threshold_secs: u64,

    /// Length of the best-throughput sliding window.
    #[serde(default = "default_best_window")]
    pub best_window_secs: u64,

    /// Attempt duration before the automatic timeout finalizes it.
    #[serde(default = "default_max_attempt_duration")]
    pub max_attempt_duration_secs: u64,

    /// Interval between best-effort durability flushes while active.
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,

    /// Channels whose messages count toward the attempt.
    #[serde(default)]
    pub tracked_channels: Vec<ChannelId>,

    /// Correction signal definitions.
    #[serde(default = "default_correction_badges")]
    pub correction_badges: Vec<CorrectionBadge>,
}

// Default functions
fn default_tick_interval() -> u64 {
    10
}
fn default_detection_window() -> usize {
    40
}
fn default_min_activity() -> u64 {
    95
}
fn default_warning_threshold() -> u64 {
    9 * 60
}
fn default_check_threshold() -> u64 {
    10 * 60
}
fn default_best_window() -> u64 {
    3600
}
fn default_max_attempt_duration() -> u64 {
    24 * 3600
}
fn default_autosave_interval() -> u64 {
    10
}
fn default_correction_badges() -> Vec<CorrectionBadge> {
    vec![
        CorrectionBadge {
            source: "channel-bot".into(),
            keyword: "of".into(),
        },
        CorrectionBadge {
            source: "ruined-bot".into(),
            keyword: "ruined".into(),
        },
    ]
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            detection_window_size: default_detection_window(),
            min_activity_count: default_min_activity(),
            warning_threshold_secs: default_warning_threshold(),
            check_threshold_secs: default_check_threshold(),
            best_window_secs: default_best_window(),
            max_attempt_duration_secs: default_max_attempt_duration(),
            autosave_interval_secs: default_autosave_interval(),
            tracked_channels: Vec::new(),
            correction_badges: default_correction_badges(),
        }
    }
}

impl TrackerConfig {
    /// Ticks making up the inactivity warning window.
    pub fn warning_window_ticks(&self) -> usize {
        (self.warning_threshold_secs / self.tick_interval_secs.max(1)) as usize
    }

    /// Ticks making up the full inactivity check window.
    pub fn check_window_ticks(&self) -> usize {
        (self.check_threshold_secs / self.tick_interval_secs.max(1)) as usize
    }

    /// Ticks making up the best-throughput window.
    pub fn best_window_ticks(&self) -> usize {
        (self.best_window_secs / self.tick_interval_secs.max(1)) as usize
    }

    /// Upper bound on sampler ticks for one attempt.
    pub fn max_ticks(&self) -> usize {
        (self.max_attempt_duration_secs / self.tick_interval_secs.max(1)) as usize
    }

    /// Whether a message from `source` with `text` is a correction signal.
    pub fn is_correction_signal(&self, source: &str, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.correction_badges
            .iter()
            .any(|badge| badge.source == source && lowered.contains(&badge.keyword))
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/coliseum/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub roster: RosterConfig,
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
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|_| {
                            ConfigError::ParseFailed(format!("cannot parse '{value}' as bool"))
                        })?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| {
                                    ConfigError::ParseFailed(format!(
                                        "cannot parse '{value}' as number"
                                    ))
                                })?
                        } else {
                            return Err(ConfigError::ParseFailed(format!(
                                "cannot parse '{value}' as number"
                            )));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value)
                            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
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

    /// Set a config value by key. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        self.save()?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
