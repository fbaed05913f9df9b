//! Core error types for wakerep-core.
//!
//! One enum per failure family, all folded into [`CoreError`] so callers at
//! the edge (CLI, host app) can propagate with `?`.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for wakerep-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistence-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rejected alarm or profile configuration
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Motion sensor could not be acquired
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// Timer/notification registration failed
    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    /// Workout session state machine misuse
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence errors raised by the key-value and history stores.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored document could not be decoded
    #[error("Stored value under '{key}' is corrupt: {message}")]
    Corrupt { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Validation errors. Raised before anything reaches persistence or the scheduler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Alarm must recur on at least one day")]
    EmptyDays,

    #[error("Target count must be positive")]
    NonPositiveTarget,

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Unknown day '{0}' (expected Mon..Sun)")]
    UnknownDay(String),

    #[error("Unknown activity type '{0}'")]
    UnknownActivity(String),

    #[error("Invalid detection profile field '{field}': {message}")]
    InvalidProfile { field: String, message: String },

    #[error("Malformed sample on line {line}: {message}")]
    MalformedSample { line: usize, message: String },

    #[error("Alarm '{0}' not found")]
    NotFound(String),
}

/// Motion sensor errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// Hardware absent or permission denied.
    #[error("Motion sensor unavailable: {reason}")]
    Unavailable { reason: String },

    /// Another session already holds the sensor.
    #[error("Motion sensor is already in use")]
    Busy,
}

/// Per-alarm scheduling failures. Never abort scheduling of other alarms.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulingError {
    #[error("Notification permission not granted")]
    PermissionDenied,

    #[error("Timer backend unavailable: {0}")]
    Unavailable(String),

    #[error("Timer backend failed: {0}")]
    Backend(String),
}

/// Workout session state machine errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("A workout session is already active")]
    AlreadyActive,
}

/// Audio collaborator errors. Logged by callers, never fatal to dismissal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    #[error("Failed to play '{sound}': {message}")]
    PlaybackFailed { sound: String, message: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
