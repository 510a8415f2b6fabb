//! Error types for LLM operations
//!
//! Every error knows whether it is worth retrying: [`LLMError::kind`] is
//! decided where the error is built (HTTP status, transport failure, or the
//! text of an upstream error payload), never by the retry loop.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Retry classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rate limits, overload, timeouts; retry with backoff
    Transient,
    /// Bad credentials, bad requests, local faults; fail immediately
    Permanent,
}

const PERMANENT_MARKERS: [&str; 8] = [
    "401",
    "403",
    "unauthorized",
    "forbidden",
    "permission",
    "api key not valid",
    "api_key_invalid",
    "invalid api key",
];

const TRANSIENT_MARKERS: [&str; 14] = [
    "429",
    "500",
    "502",
    "503",
    "504",
    "internal",
    "unavailable",
    "overloaded",
    "timeout",
    "timed out",
    "deadline",
    "rate limit",
    "quota",
    "resource_exhausted",
];

impl ErrorKind {
    /// Classify a free-text upstream error message
    ///
    /// Credential problems win over everything else; unrecognised messages
    /// are permanent.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if PERMANENT_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::Permanent
        } else if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::Transient
        } else {
            Self::Permanent
        }
    }

    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            408 | 429 | 500..=599 => Self::Transient,
            _ => Self::Permanent,
        }
    }
}

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LLMError {
    /// API request failed with a status that has no dedicated variant
    #[error("API request failed (HTTP {status}): {message}")]
    RequestFailed { status: u16, message: String },

    /// Invalid API key or authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Key is valid but not allowed to use the model
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limit or quota exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Upstream 5xx
    #[error("Service unavailable (HTTP {status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    /// Request or upstream deadline elapsed
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Error payload that only carries text; classified on construction
    #[error("Upstream error: {message}")]
    Upstream { kind: ErrorKind, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Stream broke after output was already forwarded
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Key pool is empty
    #[error("No API credentials available")]
    NoCredentials,

    /// Key does not match the expected format
    #[error("Invalid API key format: {0}")]
    InvalidCredential(String),

    /// Key is already in the pool
    #[error("API key already present in pool")]
    DuplicateCredential,

    /// A credential file could not be read or written
    #[error("Key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Every attempt failed with a transient error
    #[error("Giving up after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: Box<LLMError> },
}

impl LLMError {
    /// Build an error from a non-success HTTP status and its body
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            400 => Self::InvalidRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::PermissionDenied(message),
            404 => Self::ModelNotFound(message),
            408 => Self::Timeout(message),
            429 => Self::RateLimitExceeded(message),
            500..=599 => Self::ServiceUnavailable { status, message },
            _ => Self::RequestFailed { status, message },
        }
    }

    /// Build an error from upstream text with no usable status
    pub fn upstream(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Upstream {
            kind: ErrorKind::from_message(&message),
            message,
        }
    }

    /// Whether retrying might succeed
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimitExceeded(_) | Self::ServiceUnavailable { .. } | Self::Timeout(_) => {
                ErrorKind::Transient
            }
            Self::RequestFailed { status, .. } => ErrorKind::from_status(*status),
            Self::Upstream { kind, .. } => *kind,
            Self::HttpError(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    ErrorKind::Transient
                } else {
                    e.status()
                        .map_or(ErrorKind::Permanent, |s| ErrorKind::from_status(s.as_u16()))
                }
            }
            _ => ErrorKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
