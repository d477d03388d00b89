//! Error types for FallDetect.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Empty payload or an unrecognized image encoding.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The inference backend has not finished warming up.
    #[error("Resource not ready: {0}")]
    ResourceNotReady(String),

    #[error("Classification failed: {0}")]
    ClassificationFailure(String),

    #[error("Cache write failed: {0}")]
    CacheWriteFailure(String),

    #[error("Cache read failed: {0}")]
    CacheReadFailure(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::ResourceNotReady(_) => "resource_not_ready",
            Self::ClassificationFailure(_) => "classification_failure",
            Self::CacheWriteFailure(_) => "cache_write_failure",
            Self::CacheReadFailure(_) => "cache_read_failure",
            Self::NotFound(_) => "not_found",
            Self::Io(_) | Self::Config(_) | Self::Internal(_) => "internal",
        }
    }

    /// Message safe to show a client. Storage and backend internals stay in
    /// the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) | Self::NotFound(msg) => msg.clone(),
            Self::ResourceNotReady(_) => "service warming up, try again shortly".to_string(),
            Self::ClassificationFailure(_) => "classification failed".to_string(),
            Self::CacheReadFailure(_) | Self::CacheWriteFailure(_) => {
                "result store unavailable".to_string()
            }
            _ => "internal error".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
