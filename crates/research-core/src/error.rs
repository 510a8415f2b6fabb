//! Error types for research-core

use thiserror::Error;

/// Result type alias for research-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for core research operations
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// Analysis context failed validation
    #[error("Invalid analysis context: {0}")]
    InvalidContext(String),

    /// Analyst id is not part of the roster
    #[error("Unknown analyst type: {0}")]
    UnknownAnalyst(String),

    /// A frame could not be delivered to the client
    #[error("Failed to send message: {0}")]
    SendFailed(String),

    /// JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
