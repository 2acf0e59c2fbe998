//! Core error types for speakerlight-core.
//!
//! Every failure in the core is local and recoverable: validation failures
//! reset the timer to a safe default, unreachable displays are skipped.
//! Nothing here is fatal to a running session.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::RunState;

/// Core error type for speakerlight-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid user input (marker order, speaker count, preset name)
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A display target could not be reached
    #[error("Presentation error: {0}")]
    Presentation(#[from] PresentationError),

    /// Command not allowed in the current run state
    #[error("Cannot {operation} while the timer is {state}")]
    InvalidState {
        operation: &'static str,
        state: RunState,
    },

    /// The timer driver task is gone
    #[error("Timer driver has shut down")]
    DriverClosed,

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Markers must satisfy green <= yellow <= red
    #[error(
        "Marker times must be in order: Green <= Yellow <= Red \
         (got green={green_ms}ms, yellow={yellow_ms}ms, red={red_ms}ms)"
    )]
    MarkerOrder {
        green_ms: u64,
        yellow_ms: u64,
        red_ms: u64,
    },

    /// Speaker count outside the supported range
    #[error("Invalid number of speakers: {count} (must be between {min} and {max})")]
    SpeakerCount { count: i64, min: u8, max: u8 },

    /// No preset with this name
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// Malformed `M:S` time input
    #[error("Invalid time '{input}': expected MM:SS")]
    TimeFormat { input: String },
}

/// Display target failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresentationError {
    /// The target was closed or cannot be reached any more
    #[error("Signal target '{target}' is unavailable")]
    Unavailable { target: String },

    /// The target is alive but failed to render
    #[error("Signal target '{target}' failed to render: {message}")]
    RenderFailed { target: String, message: String },
}

impl PresentationError {
    pub fn target(&self) -> &str {
        match self {
            PresentationError::Unavailable { target }
            | PresentationError::RenderFailed { target, .. } => target,
        }
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
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

    /// Stored row could not be decoded
    #[error("Corrupt record {id}: {message}")]
    CorruptRecord { id: String, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Could not determine or create the data directory
    #[error("Failed to prepare data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dotted key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_order_message_names_all_markers() {
        let err = ValidationError::MarkerOrder {
            green_ms: 10_000,
            yellow_ms: 5_000,
            red_ms: 20_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("Green <= Yellow <= Red"));
        assert!(msg.contains("yellow=5000ms"));
    }

    #[test]
    fn invalid_state_mentions_run_state() {
        let err = CoreError::InvalidState {
            operation: "edit markers",
            state: RunState::Running,
        };
        assert_eq!(err.to_string(), "Cannot edit markers while the timer is running");
    }

    #[test]
    fn presentation_error_exposes_target() {
        let err = PresentationError::Unavailable {
            target: "popup".into(),
        };
        assert_eq!(err.target(), "popup");
    }
}
