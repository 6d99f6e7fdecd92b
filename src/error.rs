//! Error types for Albumbot

use thiserror::Error;

/// Bot error type
#[derive(Error, Debug)]
pub enum BotError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// API error
    #[error("API error: {0}")]
    Api(String),

    /// The card store could not answer (lock poisoned, worker task failed)
    #[error("Card store unavailable: {0}")]
    StoreUnavailable(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Not found error
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, BotError>;

impl From<tokio::task::JoinError> for BotError {
    fn from(e: tokio::task::JoinError) -> Self {
        BotError::StoreUnavailable(e.to_string())
    }
}
