//! Error types for imagefilter

use thiserror::Error;

/// Result type alias for imagefilter operations
pub type Result<T> = std::result::Result<T, Error>;

/// imagefilter error type
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid configuration provided: {0}")]
    Config(String),

    #[error("Failed to read configuration `{path}`: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Chain errors
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("Unknown chain element: {0}")]
    UnknownElement(String),

    #[error("Invalid chain command: {0}")]
    InvalidCommand(String),

    #[error("SDK error: {0}")]
    Sdk(String),

    // Frame errors
    #[error("Got import buffer size less than export buffer size ({capacity} < {required})")]
    BufferTooSmall { capacity: usize, required: usize },

    #[error("Frame too small for overlay: {0}")]
    FrameTooSmall(String),

    // Pipeline errors
    #[error("Invalid pipeline state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is recoverable (the frame is dropped, processing continues)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::BufferTooSmall { .. } | Error::FrameTooSmall(_) | Error::Sdk(_)
        )
    }

    /// Check if this error comes from configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::ConfigRead { .. } | Error::Json(_)
        )
    }
}
