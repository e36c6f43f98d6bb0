//! # Error Types
//!
//! Custom error types for the EX uplink using `thiserror`.
//!
//! Protocol-internal conditions (unknown sensor ids, full buffers, frame budget)
//! are never errors. Only external I/O reports through this type.

use thiserror::Error;

/// Main error type for the EX uplink
#[derive(Debug, Error)]
pub enum JetiExError {
    /// Malformed EX / Jetibox data seen by the decoder
    #[error("EX protocol error: {0}")]
    Protocol(String),

    /// Serial device or host port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Frame capture serialization errors
    #[error("Capture error: {0}")]
    Capture(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the EX uplink
pub type Result<T> = std::result::Result<T, JetiExError>;
