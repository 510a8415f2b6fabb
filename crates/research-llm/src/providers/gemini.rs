//! Google Gemini provider implementation
//!
//! This module implements the LLMProvider trait against the Generative
//! Language REST API (`generateContent` and `streamGenerateContent?alt=sse`).
//! Search grounding is requested with the `google_search` tool; the cited
//! pages come back in `groundingMetadata.groundingChunks`.

use crate::{
    CompletionRequest, CompletionResponse, CompletionStream, Credential, GroundingSource,
    LLMError, LLMProvider, Result, StreamEvent, TokenUsage, sse::SseDecoder,
};
use async_trait::async_trait;
use futures::{StreamExt, future, stream};
use reqwest::Client;
use research_utils::LlmSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration for the Gemini provider
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL, without trailing slash
    pub api_base: String,

    /// Request timeout in seconds (default: 300)
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl From<&LlmSettings> for GeminiConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self::default()
            .with_api_base(&settings.api_base)
            .with_timeout(settings.request_timeout_secs)
    }
}

impl GeminiConfig {
    /// Set a custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_base).map_err(|e| {
            LLMError::ConfigurationError(format!("invalid api_base '{}': {e}", self.api_base))
        })?;
        if self.timeout_secs == 0 {
            return Err(LLMError::ConfigurationError(
                "timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Gemini provider
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create a provider with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(GeminiConfig::default())
    }

    /// Create a provider with custom configuration
    pub fn with_config(config: GeminiConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{model}:{method}", self.config.api_base)
    }

    async fn post(
        &self,
        url: &str,
        credential: &Credential,
        request: &CompletionRequest,
    ) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", credential.expose())
            .header("content-type", "application/json")
            .json(&GeminiRequest::from(request))
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(LLMError::from_status(status, message))
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    #[instrument(skip(self, credential, request), fields(model = %request.model))]
    async fn complete(
        &self,
        credential: &Credential,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse> {
        debug!("Sending request to Gemini API");

        let url = self.endpoint(&request.model, "generateContent");
        let response = self.post(&url, credential, request).await?;
        let chunk: GenerateContentResponse = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        let mut completion = CompletionResponse::default();
        for event in chunk.into_events()? {
            completion.push(event);
        }

        debug!(
            "Received response - finish_reason: {:?}, sources: {}",
            completion.finish_reason,
            completion.sources.len()
        );
        Ok(completion)
    }

    #[instrument(skip(self, credential, request), fields(model = %request.model))]
    async fn stream(
        &self,
        credential: &Credential,
        request: &CompletionRequest,
    ) -> Result<CompletionStream> {
        debug!("Opening Gemini stream");

        let url = format!(
            "{}?alt=sse",
            self.endpoint(&request.model, "streamGenerateContent")
        );
        let response = self.post(&url, credential, request).await?;

        let events = response
            .bytes_stream()
            .map(Some)
            .chain(stream::once(future::ready(None)))
            .scan(SseDecoder::new(), |decoder, chunk| {
                let payloads: Vec<Result<String>> = match chunk {
                    Some(Ok(bytes)) => decoder.feed(&bytes).into_iter().map(Ok).collect(),
                    Some(Err(e)) => vec![Err(LLMError::StreamInterrupted(e.to_string()))],
                    None => decoder.finish().into_iter().map(Ok).collect(),
                };
                future::ready(Some(stream::iter(payloads)))
            })
            .flatten()
            .flat_map(|payload| {
                let events = payload.and_then(|data| parse_payload(&data));
                stream::iter(match events {
                    Ok(events) => events.into_iter().map(Ok).collect::<Vec<_>>(),
                    Err(e) => vec![Err(e)],
                })
            });

        Ok(events.boxed())
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Decode one SSE `data:` payload into stream events
pub fn parse_payload(data: &str) -> Result<Vec<StreamEvent>> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(data) {
        let ErrorBody { code, message, .. } = envelope.error;
        return Err(match code {
            Some(code) => LLMError::from_status(code, message),
            None => LLMError::upstream(message),
        });
    }

    let chunk: GenerateContentResponse = serde_json::from_str(data)
        .map_err(|e| LLMError::UnexpectedResponse(format!("Bad stream chunk: {e}")))?;
    chunk.into_events()
}

// Gemini-specific request/response types
// These match the Generative Language API format

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
}

impl From<&CompletionRequest> for GeminiRequest {
    fn from(request: &CompletionRequest) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(request.prompt.clone()),
                }],
            }],
            system_instruction: request.system.as_ref().map(|system| Content {
                role: None,
                parts: vec![Part {
                    text: Some(system.clone()),
                }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
            tools: if request.search_grounding {
                vec![serde_json::json!({ "google_search": {} })]
            } else {
                Vec::new()
            },
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

impl GenerateContentResponse {
    fn into_events(self) -> Result<Vec<StreamEvent>> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LLMError::InvalidRequest(format!("prompt blocked: {reason}")));
        }

        let usage = self.usage_metadata.map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        });

        let mut events = Vec::new();
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Ok(events);
        };

        let text: String = candidate
            .content
            .unwrap_or_default()
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        if !text.is_empty() {
            events.push(StreamEvent::Text(text));
        }

        let sources: Vec<GroundingSource> = candidate
            .grounding_metadata
            .map(|m| m.grounding_chunks)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|chunk| chunk.web)
            .filter(|web| !web.uri.is_empty())
            .map(|web| GroundingSource {
                title: web.title,
                uri: web.uri,
            })
            .collect();
        if !sources.is_empty() {
            events.push(StreamEvent::Sources(sources));
        }

        if let Some(finish_reason) = candidate.finish_reason {
            events.push(StreamEvent::Done {
                finish_reason: Some(finish_reason),
                usage,
            });
        }
        Ok(events)
    }
}
