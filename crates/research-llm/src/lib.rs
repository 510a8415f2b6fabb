//! LLM access layer for research-rs
//!
//! This crate wraps every outbound model call:
//!
//! - [`KeyPool`] hands out credentials round-robin
//! - [`RetryPolicy`] retries transient failures with capped, jittered backoff
//! - [`LLMProvider`] is the provider seam, implemented by
//!   [`providers::GeminiProvider`] (behind the `gemini` feature)
//! - [`LlmClient`] ties the three together: one lease per attempt

pub mod client;
pub mod completion;
pub mod error;
pub mod keys;
pub mod provider;
pub mod retry;
pub mod sse;

// Re-export main types
pub use client::LlmClient;
pub use completion::{
    CompletionRequest, CompletionRequestBuilder, CompletionResponse, CompletionStream,
    GroundingSource, StreamEvent, TokenUsage,
};
pub use error::{ErrorKind, LLMError, Result};
pub use keys::{Credential, KeyLease, KeyPool, KeyPoolStats, is_valid_gemini_key};
pub use provider::LLMProvider;
#[cfg(any(test, feature = "mock"))]
pub use provider::MockLLMProvider;
pub use retry::RetryPolicy;

// Provider implementations (feature-gated)
#[cfg(feature = "gemini")]
pub mod providers;
