//! Error types for the NJLEG pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, NjlegError>;

/// Main error type for the NJLEG pipeline
#[derive(Error, Debug)]
pub enum NjlegError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Subprocess error: {0}")]
    Subprocess(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Data shape error: {0}")]
    DataShape(String),

    #[error("Table name collision: {first} and {second} both sanitize to {sanitized}")]
    TableNameCollision {
        first: String,
        second: String,
        sanitized: String,
    },

    #[error("Stage order violation for year {year}: {message}")]
    StageOrder { year: i32, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
