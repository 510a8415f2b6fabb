//! Error types for research-export

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for research-export
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors raised while converting a report
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("HTML content is empty")]
    EmptyHtml,

    /// docx-rs failed to pack the document
    #[error("Word document generation failed: {0}")]
    Docx(String),

    /// The browser binary could not be started
    #[error("Failed to launch {browser}: {source}")]
    BrowserSpawn {
        browser: String,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF rendering timed out after {0:?}")]
    BrowserTimeout(Duration),

    #[error("Browser exited with {status}: {stderr}")]
    BrowserFailed { status: String, stderr: String },

    #[error("Browser produced no output at {}", .0.display())]
    EmptyOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExportError> for research_core::Error {
    fn from(err: ExportError) -> Self {
        research_core::Error::Generic(err.to_string())
    }
}
