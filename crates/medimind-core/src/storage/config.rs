//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Reminder timing (escalation delay, polling cadence)
//! - Notification preferences (vibration, audio)
//! - The caregiver shown on escalated calls
//!
//! Configuration is stored at `~/.config/medimind/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::care::CaregiverProfile;
use crate::error::{ConfigError, CoreError, Result};
use crate::reminder::{DEFAULT_ESCALATION_DELAY_MINUTES, DEFAULT_TICK_INTERVAL_SECS};

/// Reminder timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    /// Minutes an alarm may go unacknowledged before the caregiver call.
    /// Zero or less escalates on the next tick.
    #[serde(default = "default_escalation_delay")]
    pub escalation_delay_minutes: i64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub vibration: bool,
    #[serde(default = "default_true")]
    pub audio_enabled: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/medimind/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub caregiver: CaregiverProfile,
}

fn default_escalation_delay() -> i64 {
    DEFAULT_ESCALATION_DELAY_MINUTES
}
fn default_tick_interval() -> u64 {
    DEFAULT_TICK_INTERVAL_SECS
}
fn default_true() -> bool {
    true
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            escalation_delay_minutes: default_escalation_delay(),
            tick_interval_secs: default_tick_interval(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            vibration: true,
            audio_enabled: true,
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
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as integer")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there when missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str::<Config>(&content).map_err(|e| {
                CoreError::from(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
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

    /// Set a config value by key in memory. Returns error if the key is
    /// unknown or the value does not fit the key's type.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.apply(key, value)?;
        self.save()
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.reminders.escalation_delay_minutes, 30);
        assert_eq!(parsed.reminders.tick_interval_secs, 10);
        assert!(parsed.notifications.vibration);
        assert_eq!(parsed.caregiver.name, "Caregiver");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[reminders]\nescalation_delay_minutes = 5\n").unwrap();
        assert_eq!(parsed.reminders.escalation_delay_minutes, 5);
        assert_eq!(parsed.reminders.tick_interval_secs, 10);
        assert!(parsed.notifications.audio_enabled);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("notifications.vibration").as_deref(), Some("true"));
        assert_eq!(cfg.get("reminders.escalation_delay_minutes").as_deref(), Some("30"));
        assert_eq!(cfg.get("caregiver.name").as_deref(), Some("Caregiver"));
        assert!(cfg.get("reminders.missing_key").is_none());
    }

    #[test]
    fn apply_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.apply("reminders.escalation_delay_minutes", "-1").unwrap();
        cfg.apply("notifications.vibration", "false").unwrap();
        cfg.apply("caregiver.name", "Somchai").unwrap();
        cfg.apply("caregiver.photo", "https://example.com/p.png").unwrap();
        assert_eq!(cfg.reminders.escalation_delay_minutes, -1);
        assert!(!cfg.notifications.vibration);
        assert_eq!(cfg.caregiver.name, "Somchai");
        assert_eq!(cfg.caregiver.photo.as_deref(), Some("https://example.com/p.png"));
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("reminders.nonexistent_key", "1"),
            Err(crate::CoreError::Config(ConfigError::UnknownKey(_)))
        ));
    }

    #[test]
    fn apply_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.apply("notifications.vibration", "not_a_bool").is_err());
        assert!(cfg.apply("reminders.tick_interval_secs", "-3").is_err());
        assert!(cfg.apply("reminders.tick_interval_secs", "ten").is_err());
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.reminders.escalation_delay_minutes, 30);

        let mut changed = cfg.clone();
        changed.reminders.escalation_delay_minutes = 12;
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().reminders.escalation_delay_minutes, 12);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "reminders = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(crate::CoreError::Config(ConfigError::LoadFailed { .. }))
        ));
    }
}
