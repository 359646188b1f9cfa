//! Error types for the remedio_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for remedio_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Referenced medication or history entry does not exist
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// Malformed dosing rule rejected at the mutation boundary
    #[error("invalid dosing rule: {0}")]
    InvalidRule(String),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for a missing-medication error
    pub fn medication_not_found(id: impl ToString) -> Self {
        Error::NotFound {
            what: "medication",
            id: id.to_string(),
        }
    }
}
