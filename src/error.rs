//! Custom error types for the source registry

use thiserror::Error;

/// Main error type for registry operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for the source registry
pub type Result<T> = std::result::Result<T, Error>;
