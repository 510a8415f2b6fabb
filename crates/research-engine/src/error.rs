//! Error types for research-engine

use thiserror::Error;

/// Result type alias for research-engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while running analysts or assembling reports
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("LLM error: {0}")]
    Llm(#[from] research_llm::LLMError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] research_prompt::PromptError),

    #[error("Market data error: {0}")]
    Market(#[from] research_market::MarketError),

    #[error(transparent)]
    Core(#[from] research_core::Error),

    /// The model finished without producing any text
    #[error("Empty response from model for {0}")]
    EmptyResponse(String),

    #[error("No analysts selected")]
    NoAnalysts,

    /// A required component was not supplied to a builder
    #[error("Engine not configured: {0}")]
    NotConfigured(String),
}

impl From<EngineError> for research_core::Error {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(inner) => inner,
            other => research_core::Error::Generic(other.to_string()),
        }
    }
}
