//! Error types for u-crew.
//!
//! Only malformed input aborts a call. Business-level impossibility
//! (unplaceable jobs, unresolvable conflicts, approximate distances) is
//! reported inside [`SchedulingResult`](crate::models::SchedulingResult).

use chrono::NaiveDate;
use thiserror::Error;

use crate::validation::ValidationError;

/// Core error type.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The request failed validation.
    #[error("Invalid input: {}", join_messages(.0))]
    InvalidInput(Vec<ValidationError>),

    /// The planning range ends before it starts.
    #[error("Degenerate date range: end ({end}) is before start ({start})")]
    DegenerateDateRange { start: NaiveDate, end: NaiveDate },

    /// A bulk request names a job that is not in the snapshot.
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse TOML.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for [`EngineError`].
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
