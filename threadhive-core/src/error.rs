//! Core error types
//!
//! Errors raised while parsing boundary input or loading configuration. Higher
//! layers wrap these into their own error enums.

use thiserror::Error;
use tracing::error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Main error type for the core crate
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid identifier: '{value}'")]
    InvalidId { value: String },

    #[error("Unknown role: '{value}'")]
    UnknownRole { value: String },

    #[error("Validation error on '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("JWT_SECRET is not set; refusing to start without a session signing secret")]
    MissingSecret,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Build a configuration error without an underlying cause.
    pub fn config(message: impl Into<String>) -> Self {
        CoreError::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Whether the error stems from malformed client input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidId { .. } | CoreError::UnknownRole { .. } | CoreError::Validation { .. }
        )
    }

    /// Log fatal startup errors
    pub fn log(&self) {
        error!(error = %self, "Startup aborted");
    }
}
