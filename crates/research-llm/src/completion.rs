//! Completion request and response types

use crate::Result;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Single-turn generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier (provider-specific)
    pub model: String,

    /// Optional system instruction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// User prompt
    pub prompt: String,

    /// Maximum tokens to generate
    pub max_output_tokens: u32,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Let the model ground its answer in web search results
    pub search_grounding: bool,
}

impl CompletionRequest {
    /// Create a builder for completion requests
    pub fn builder(model: impl Into<String>) -> CompletionRequestBuilder {
        CompletionRequestBuilder::new(model)
    }
}

/// Builder for CompletionRequest
#[derive(Debug, Clone)]
pub struct CompletionRequestBuilder {
    model: String,
    system: Option<String>,
    prompt: String,
    max_output_tokens: u32,
    temperature: Option<f32>,
    search_grounding: bool,
}

impl CompletionRequestBuilder {
    /// Create a new builder
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: String::new(),
            max_output_tokens: 8000,
            temperature: None,
            search_grounding: false,
        }
    }

    /// Set the system instruction
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the user prompt
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the maximum tokens
    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn search_grounding(mut self, enabled: bool) -> Self {
        self.search_grounding = enabled;
        self
    }

    /// Build the completion request
    pub fn build(self) -> CompletionRequest {
        CompletionRequest {
            model: self.model,
            system: self.system,
            prompt: self.prompt,
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
            search_grounding: self.search_grounding,
        }
    }
}

/// A web page the model cited
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens
    pub input_tokens: u32,

    /// Number of output tokens
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used (input + output)
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Response from a non-streaming completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,

    /// Grounding citations, deduplicated, in first-seen order
    pub sources: Vec<GroundingSource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// One item of a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Next fragment of generated text
    Text(String),
    /// Citations attached to the response so far
    Sources(Vec<GroundingSource>),
    /// Generation finished
    Done {
        finish_reason: Option<String>,
        usage: Option<TokenUsage>,
    },
}

/// Boxed stream of completion events
pub type CompletionStream = BoxStream<'static, Result<StreamEvent>>;

impl CompletionResponse {
    /// Fold stream events into a response
    pub fn push(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Text(text) => self.text.push_str(&text),
            StreamEvent::Sources(sources) => {
                for source in sources {
                    if !self.sources.contains(&source) {
                        self.sources.push(source);
                    }
                }
            }
            StreamEvent::Done {
                finish_reason,
                usage,
            } => {
                self.finish_reason = finish_reason;
                self.usage = usage;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let request = CompletionRequest::builder("gemini-2.5-flash")
            .system("You are a sell-side analyst")
            .prompt("Cover ACME")
            .max_output_tokens(2048)
            .temperature(0.7)
            .search_grounding(true)
            .build();

        assert_eq!(request.model, "gemini-2.5-flash");
        assert_eq!(request.prompt, "Cover ACME");
        assert_eq!(request.max_output_tokens, 2048);
        assert_eq!(request.temperature, Some(0.7));
        assert!(request.search_grounding);
    }

    #[test]
    fn test_token_usage() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn test_fold_events() {
        let source = GroundingSource {
            title: "10-K".to_string(),
            uri: "https://sec.test/10k".to_string(),
        };
        let mut response = CompletionResponse::default();
        response.push(StreamEvent::Text("Strong ".to_string()));
        response.push(StreamEvent::Sources(vec![source.clone()]));
        response.push(StreamEvent::Text("buy.".to_string()));
        response.push(StreamEvent::Sources(vec![source.clone()]));
        response.push(StreamEvent::Done {
            finish_reason: Some("STOP".to_string()),
            usage: None,
        });

        assert_eq!(response.text, "Strong buy.");
        assert_eq!(response.sources, vec![source]);
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
    }
}
