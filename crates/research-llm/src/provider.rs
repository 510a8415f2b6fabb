//! LLM provider trait definition

use crate::{CompletionRequest, CompletionResponse, CompletionStream, Credential, Result};
use async_trait::async_trait;

/// Trait for LLM providers
///
/// Providers hold no credentials of their own: the caller passes the key to
/// use for each call, which is what lets [`crate::LlmClient`] rotate keys
/// between retry attempts.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a full completion
    async fn complete(
        &self,
        credential: &Credential,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse>;

    /// Open a streamed completion
    ///
    /// An `Err` here means the stream could not be established; errors
    /// inside the stream are mid-generation failures.
    async fn stream(
        &self,
        credential: &Credential,
        request: &CompletionRequest,
    ) -> Result<CompletionStream>;

    /// Get the provider name (e.g., "gemini")
    fn name(&self) -> &'static str;
}
