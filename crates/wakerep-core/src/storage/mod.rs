//! SQLite persistence and the TOML configuration file.

mod config;
pub mod database;
pub mod migrations;

pub use config::{AudioConfig, Config, NotificationsConfig, WorkoutConfig};
pub use database::Database;

use std::path::PathBuf;

use crate::error::StorageError;

/// Returns the data directory, creating it when missing.
///
/// `WAKEREP_DATA_DIR` wins when set. Otherwise `~/.config/wakerep[-dev]/`,
/// with `WAKEREP_ENV=dev` selecting the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let dir = match std::env::var_os("WAKEREP_DATA_DIR") {
        Some(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("WAKEREP_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("wakerep-dev")
            } else {
                base_dir.join("wakerep")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| StorageError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
