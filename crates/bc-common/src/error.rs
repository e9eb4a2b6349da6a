//! Error types for band capture.

use thiserror::Error;

/// Result type alias for band capture operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for band capture.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    // Ingestion errors (20-29)
    #[error("invalid sample shape: expected {expected} values, got {actual}")]
    InvalidSampleShape { expected: usize, actual: usize },

    #[error("channel {0} is not enabled for this session")]
    UnknownChannel(String),

    #[error("invalid buffer geometry: {0}")]
    InvalidBuffer(String),

    // Source errors (30-39)
    #[error("sensor source failed: {0}")]
    Source(String),

    #[error("sensor source not connected: {0}")]
    NotConnected(String),

    // Delivery errors (40-49)
    #[error("sink failed: {0}")]
    Sink(String),

    #[error("dispatcher closed")]
    DispatcherClosed,

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::UnknownPreset(_) => 11,
            Error::InvalidSampleShape { .. } => 20,
            Error::UnknownChannel(_) => 21,
            Error::InvalidBuffer(_) => 22,
            Error::Source(_) => 30,
            Error::NotConnected(_) => 31,
            Error::Sink(_) => 40,
            Error::DispatcherClosed => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }
}
