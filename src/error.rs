//! Error types for aircap.

use crate::storage::StorageError;
use crate::transcode::TranscodeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AircapError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Connectivity errors (fatal to the producer only)
    #[error("Failed to connect to stream {url}: {message}")]
    StreamConnect { url: String, message: String },

    #[error("Stream read failed: {message}")]
    StreamRead { message: String },

    // Storage errors (startup validation and per-chunk uploads)
    #[error(transparent)]
    Storage(#[from] StorageError),

    // Per-chunk transcode errors
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, AircapError>;
