//! Core Error Types
//!
//! Defines the error categories shared across the Guided Triage workspace.
//! Invariant violations are reported with a distinct variant per category so
//! callers can tell an unknown id apart from an out-of-range index or an
//! illegal state transition.

use thiserror::Error;

/// Core error type for the Guided Triage workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Unknown step, task, hospital or symptom tag
    #[error("Not found: {0}")]
    NotFound(String),

    /// Step index outside the step sequence
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Mutation against a step that has already completed
    #[error("Already completed: {0}")]
    AlreadyCompleted(String),

    /// Stage or step ordering violation
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an out of range error
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }

    /// Create an already completed error
    pub fn already_completed(msg: impl Into<String>) -> Self {
        Self::AlreadyCompleted(msg.into())
    }

    /// Create an invalid transition error
    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
