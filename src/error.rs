//! Error types for the status backend

use thiserror::Error;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    /// Transient cache error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Durable storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Upstream health source error
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Transient cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend could not be reached
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    /// Entry exists but holds a value of another kind
    #[error("Unexpected value for key {key}: expected {expected}")]
    TypeMismatch {
        /// Cache key
        key: String,
        /// Expected value kind
        expected: &'static str,
    },
}

/// Durable storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The blocking storage task panicked or was cancelled
    #[error("Storage task failed: {0}")]
    Task(String),

    /// Stored data could not be decoded
    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

/// Upstream health source errors
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Transport failure, no response received
    #[error("Request failed: {0}")]
    Transport(String),

    /// Upstream answered with a non-success status
    #[error("Upstream returned status {code}: {message}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Reason or body excerpt
        message: String,
    },

    /// Response was not the expected JSON document
    #[error("Invalid upstream document: {0}")]
    InvalidDocument(String),
}

impl UpstreamError {
    /// HTTP status code attached to this failure, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
