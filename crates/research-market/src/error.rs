//! Error types for market data operations

use thiserror::Error;

/// Market data specific errors
#[derive(Debug, Error)]
pub enum MarketError {
    /// Invalid ticker symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Alpha Vantage returned an error body
    #[error("Alpha Vantage error: {0}")]
    AlphaVantageError(String),

    /// Provider quota used up
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Technical indicator calculation error
    #[error("Technical indicator error: {0}")]
    IndicatorError(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for market operations
pub type Result<T> = std::result::Result<T, MarketError>;

impl From<MarketError> for research_core::Error {
    fn from(err: MarketError) -> Self {
        research_core::Error::Generic(err.to_string())
    }
}
