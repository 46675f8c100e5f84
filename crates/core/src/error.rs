// Central Error Type for the Sync Engine

use thiserror::Error;

/// Engine-level error type
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Buffer error: {0}")]
    Buffer(#[from] crate::port::BufferError),

    #[error("Executor error: {0}")]
    Executor(#[from] crate::port::ExecutorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;
