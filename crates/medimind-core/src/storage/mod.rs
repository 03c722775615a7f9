mod config;
pub mod database;

pub use config::{Config, NotificationsConfig, RemindersConfig};
pub use database::{AdherenceStats, Database, DoseRecord};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns `~/.config/medimind[-dev]/` based on MEDIMIND_ENV.
///
/// Set MEDIMIND_ENV=dev to use the development data directory, or
/// MEDIMIND_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("MEDIMIND_DATA_DIR") {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("MEDIMIND_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("medimind-dev")
            } else {
                base_dir.join("medimind")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
