//! Error types for apimon

use thiserror::Error;

/// Result type alias using apimon's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for apimon operations
///
/// Payload builders and row formatters never return these: malformed engine
/// data degrades to display defaults instead. Only boundary operations
/// (time ranges, configuration, decoding input documents) can fail.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration source could not be read or merged
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
