//! A persona analyst that streams its analysis to a client

use crate::error::{EngineError, Result};
use crate::relay::StreamRelay;
use futures::StreamExt;
use research_core::{AnalysisContext, AnalysisResult, AnalystKind, MessageSink};
use research_llm::{CompletionRequest, CompletionResponse, LlmClient, StreamEvent};
use research_market::{FinancialSnapshot, MarketDataSource};
use research_prompt::PromptAssembler;
use research_utils::LlmSettings;
use serde::Serialize;
use serde_json::{Map, json};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Follow-up discussion stays close to the written analysis
const CHAT_TEMPERATURE: f32 = 0.15;

/// Model parameters shared by every analyst
#[derive(Debug, Clone, PartialEq)]
pub struct AnalystConfig {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Ask the model to ground its answer in web search results
    pub search_grounding: bool,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self::from(&LlmSettings::default())
    }
}

impl From<&LlmSettings> for AnalystConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
            search_grounding: settings.search_grounding,
        }
    }
}

/// Running totals for one analyst
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub executions: u64,
    pub successes: u64,
    pub errors: u64,
    /// Seconds, summed over every execution
    pub total_time: f64,
}

impl PerformanceStats {
    pub fn success_rate(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.successes as f64 / self.executions as f64
        }
    }

    pub fn average_time(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.total_time / self.executions as f64
        }
    }

    fn record(&mut self, success: bool, elapsed: f64) {
        self.executions += 1;
        if success {
            self.successes += 1;
        } else {
            self.errors += 1;
        }
        self.total_time += elapsed;
    }
}

/// What one successful run produced
struct Analysis {
    response: CompletionResponse,
    snapshot: FinancialSnapshot,
}

/// One persona backed by the LLM and a market data source
pub struct StreamingAnalyst {
    kind: AnalystKind,
    llm: LlmClient,
    prompts: Arc<PromptAssembler>,
    market: Arc<dyn MarketDataSource>,
    config: AnalystConfig,
    stats: Mutex<PerformanceStats>,
}

impl StreamingAnalyst {
    pub fn new(
        kind: AnalystKind,
        llm: LlmClient,
        prompts: Arc<PromptAssembler>,
        market: Arc<dyn MarketDataSource>,
        config: AnalystConfig,
    ) -> Self {
        Self {
            kind,
            llm,
            prompts,
            market,
            config,
            stats: Mutex::new(PerformanceStats::default()),
        }
    }

    pub fn kind(&self) -> AnalystKind {
        self.kind
    }

    pub fn config(&self) -> &AnalystConfig {
        &self.config
    }

    pub fn stats(&self) -> PerformanceStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }

    /// Run the analysis, streaming output to `sink`
    ///
    /// Never fails: errors become a failed [`AnalysisResult`] plus an
    /// `analysis_error` frame.
    #[instrument(skip(self, context, sink), fields(analyst = self.kind.id(), ticker = context.ticker()))]
    pub async fn execute(
        &self,
        context: &AnalysisContext,
        sink: Arc<dyn MessageSink>,
    ) -> AnalysisResult {
        let started = Instant::now();
        let relay = StreamRelay::new(
            sink,
            self.kind,
            context.ticker(),
            context.company_name(),
        );
        relay
            .status(
                "started",
                &format!(
                    "{} started analysing {}",
                    self.kind.name(),
                    context.company_name()
                ),
            )
            .await;

        let outcome = self.run(context, &relay).await;
        let elapsed = started.elapsed().as_secs_f64();

        let result = match outcome {
            Ok(analysis) => {
                let source_urls: Vec<String> = analysis
                    .response
                    .sources
                    .iter()
                    .map(|s| s.uri.clone())
                    .collect();

                let mut data = Map::new();
                data.insert("analyst_name".into(), json!(self.kind.name()));
                data.insert(
                    "streaming_analysis".into(),
                    json!(analysis.response.text),
                );
                data.insert("source_count".into(), json!(source_urls.len()));
                data.insert("snapshot".into(), json!(analysis.snapshot));

                let result =
                    AnalysisResult::completed(self.kind, data, elapsed).with_sources(source_urls);
                info!(
                    "{} finished in {:.1}s ({} chars, {} sources, {} dropped frames)",
                    self.kind.name(),
                    elapsed,
                    analysis.response.text.len(),
                    result.data_sources.len(),
                    relay.send_failures()
                );
                relay.status("completed", "Analysis complete").await;
                relay
                    .output(json!({
                        "quality_score": result.quality_score,
                        "processing_time": result.processing_time,
                        "source_count": result.data_sources.len(),
                    }))
                    .await;
                result
            }
            Err(e) => {
                error!("{} failed: {}", self.kind.name(), e);
                let message = e.to_string();
                relay.status("error", &message).await;
                relay.error(&message).await;
                AnalysisResult::failed(self.kind, message, elapsed)
            }
        };

        if let Ok(mut stats) = self.stats.lock() {
            stats.record(result.is_success(), elapsed);
        }
        result
    }

    async fn run(&self, context: &AnalysisContext, relay: &StreamRelay) -> Result<Analysis> {
        let snapshot = match self.market.snapshot(context.ticker()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "Market data unavailable for {} via {}: {}",
                    context.ticker(),
                    self.market.name(),
                    e
                );
                FinancialSnapshot::empty(context.ticker())
            }
        };

        let metrics = snapshot.metrics();
        let prompt = self.prompts.render_for(self.kind, context, Some(&metrics))?;
        let request = CompletionRequest::builder(&self.config.model)
            .prompt(prompt)
            .max_output_tokens(self.config.max_output_tokens)
            .temperature(self.config.temperature)
            .search_grounding(self.config.search_grounding)
            .build();

        let response = self.stream_through(&request, relay).await?;
        relay.finish(&response.text).await;

        Ok(Analysis { response, snapshot })
    }

    /// Answer a follow-up question, streaming the reply through `relay`
    ///
    /// `prompt` already carries the analysis and conversation so far.
    #[instrument(skip(self, prompt, relay), fields(analyst = self.kind.id()))]
    pub async fn discuss(&self, prompt: String, relay: &StreamRelay) -> Result<String> {
        let request = CompletionRequest::builder(&self.config.model)
            .prompt(prompt)
            .max_output_tokens(self.config.max_output_tokens)
            .temperature(CHAT_TEMPERATURE)
            .build();
        let response = self.stream_through(&request, relay).await?;
        Ok(response.text)
    }

    /// Forward every event of one model stream to `relay` and fold them
    /// into a response; a stream without text is an error
    async fn stream_through(
        &self,
        request: &CompletionRequest,
        relay: &StreamRelay,
    ) -> Result<CompletionResponse> {
        let mut events = self.llm.stream(request).await?;
        let mut response = CompletionResponse::default();
        while let Some(event) = events.next().await {
            let event = event?;
            match &event {
                StreamEvent::Text(text) => relay.on_chunk(text).await,
                StreamEvent::Sources(sources) => {
                    for source in sources {
                        if !response.sources.contains(source) {
                            relay.source(source).await;
                        }
                    }
                }
                StreamEvent::Done { .. } => {}
            }
            response.push(event);
        }

        if response.text.trim().is_empty() {
            return Err(EngineError::EmptyResponse(self.kind.id().to_string()));
        }
        Ok(response)
    }
}

impl std::fmt::Debug for StreamingAnalyst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingAnalyst")
            .field("kind", &self.kind)
            .field("model", &self.config.model)
            .field("market", &self.market.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use research_core::{AnalysisStatus, MessageKind, RecordingSink};
    use research_llm::{
        Credential, GroundingSource, KeyPool, LLMError, MockLLMProvider, RetryPolicy,
    };
    use research_market::{MarketError, MockMarketDataSource};

    fn context() -> AnalysisContext {
        AnalysisContext::builder("Acme Corp", "ACME").build().unwrap()
    }

    fn market(available: bool) -> Arc<dyn MarketDataSource> {
        let mut market = MockMarketDataSource::new();
        market.expect_name().return_const("mock");
        market.expect_snapshot().returning(move |ticker: &str| {
            if available {
                Ok(FinancialSnapshot {
                    symbol: ticker.to_string(),
                    current_price: Some(189.84),
                    ..Default::default()
                })
            } else {
                Err(MarketError::DataUnavailable {
                    symbol: ticker.to_string(),
                    reason: "offline".to_string(),
                })
            }
        });
        Arc::new(market)
    }

    fn analyst(provider: MockLLMProvider, market: Arc<dyn MarketDataSource>) -> StreamingAnalyst {
        let keys = Arc::new(KeyPool::new(vec![Credential::new("key-a")]));
        let llm = LlmClient::new(Arc::new(provider), keys, RetryPolicy::no_retry());
        StreamingAnalyst::new(
            AnalystKind::Fundamentals,
            llm,
            Arc::new(PromptAssembler::new().unwrap()),
            market,
            AnalystConfig::default(),
        )
    }

    fn streaming_provider(events: Vec<research_llm::Result<StreamEvent>>) -> MockLLMProvider {
        let mut provider = MockLLMProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_stream()
            .times(1)
            .return_once(move |_: &Credential, _: &CompletionRequest| {
                Ok(stream::iter(events).boxed())
            });
        provider
    }

    #[tokio::test]
    async fn test_execute_streams_and_completes() {
        let source = GroundingSource {
            title: "10-K".to_string(),
            uri: "https://acme.example/10k".to_string(),
        };
        let provider = streaming_provider(vec![
            Ok(StreamEvent::Text("## Verdict\n".to_string())),
            Ok(StreamEvent::Sources(vec![source.clone()])),
            Ok(StreamEvent::Text("Buy [1]".to_string())),
            Ok(StreamEvent::Sources(vec![source])),
            Ok(StreamEvent::Done {
                finish_reason: Some("STOP".to_string()),
                usage: None,
            }),
        ]);
        let analyst = analyst(provider, market(true));
        let sink = Arc::new(RecordingSink::new());

        let result = analyst.execute(&context(), sink.clone()).await;

        assert!(result.is_success());
        assert_eq!(result.agent_id, "streaming_fundamentals_analyst");
        assert_eq!(result.content(), Some("## Verdict\nBuy [1]"));
        assert_eq!(result.data["source_count"], 1);
        assert_eq!(result.data["snapshot"]["current_price"], 189.84);
        assert_eq!(result.data_sources, vec!["https://acme.example/10k"]);

        let kinds: Vec<_> = sink.messages().iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::AgentStatus,
                MessageKind::StreamingAiContent,
                MessageKind::ResearchSource,
                MessageKind::StreamingAiContent,
                MessageKind::StreamingAiContentFinal,
                MessageKind::AgentStatus,
                MessageKind::AgentOutput,
            ]
        );

        let stats = analyst.stats();
        assert_eq!(stats.executions, 1);
        assert!((stats.success_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_market_failure_degrades_to_empty_snapshot() {
        let provider = streaming_provider(vec![Ok(StreamEvent::Text("Hold".to_string()))]);
        let analyst = analyst(provider, market(false));

        let result = analyst
            .execute(&context(), Arc::new(RecordingSink::new()))
            .await;

        assert!(result.is_success());
        assert!(result.data["snapshot"]["current_price"].is_null());
    }

    #[tokio::test]
    async fn test_llm_failure_becomes_failed_result() {
        let mut provider = MockLLMProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_stream()
            .returning(|_: &Credential, _: &CompletionRequest| {
                Err(LLMError::from_status(403, "API key not valid"))
            });
        let analyst = analyst(provider, market(true));
        let sink = Arc::new(RecordingSink::new());

        let result = analyst.execute(&context(), sink.clone()).await;

        assert_eq!(result.status, AnalysisStatus::Failed);
        assert!(result.error_message.is_some());
        assert!(result.quality_score.abs() < f64::EPSILON);

        let messages = sink.messages();
        let last = messages.last().unwrap();
        assert_eq!(last.kind, MessageKind::AnalysisError);
        assert_eq!(last.data["analyst"], "fundamentals");
        assert!(
            messages
                .iter()
                .any(|m| m.kind == MessageKind::AgentStatus && m.data["status"] == "error")
        );

        let stats = analyst.stats();
        assert_eq!(stats.errors, 1);
        assert!(stats.success_rate().abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_response_fails() {
        let provider = streaming_provider(vec![Ok(StreamEvent::Done {
            finish_reason: Some("SAFETY".to_string()),
            usage: None,
        })]);
        let analyst = analyst(provider, market(true));

        let result = analyst
            .execute(&context(), Arc::new(RecordingSink::new()))
            .await;
        assert!(!result.is_success());
        assert!(
            result
                .error_message
                .unwrap()
                .contains("Empty response from model")
        );
    }

    #[test]
    fn test_performance_stats() {
        let mut stats = PerformanceStats::default();
        assert!(stats.average_time().abs() < f64::EPSILON);
        stats.record(true, 2.0);
        stats.record(false, 4.0);
        assert_eq!(stats.executions, 2);
        assert!((stats.success_rate() - 0.5).abs() < f64::EPSILON);
        assert!((stats.average_time() - 3.0).abs() < f64::EPSILON);
    }
}
