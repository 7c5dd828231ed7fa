//! # Error Types
//!
//! Custom error types for Track Relay using `thiserror`.

use thiserror::Error;

/// Main error type for Track Relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Position queue storage errors
    #[error("Queue error: {0}")]
    Queue(String),

    /// Queue journal (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport setup errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// GPS receiver errors
    #[error("GPS error: {0}")]
    Gps(String),

    /// Access to the GPS receiver was refused
    #[error("Permission denied: {0}")]
    Permission(String),
}

/// Result type alias for Track Relay
pub type Result<T> = std::result::Result<T, RelayError>;
