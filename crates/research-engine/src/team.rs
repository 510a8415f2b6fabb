//! The full analyst roster and report generation

use crate::analyst::{AnalystConfig, PerformanceStats, StreamingAnalyst};
use crate::chat::{ChatRequest, ChatStore};
use crate::error::{EngineError, Result};
use crate::memory::SharedMemory;
use crate::relay::StreamRelay;
use crate::report;
use chrono::{DateTime, Utc};
use research_core::{
    AnalysisContext, AnalysisResult, AnalystKind, MessageKind, MessageSink, StreamMessage,
};
use research_llm::LlmClient;
use research_market::{CachedMarketData, FinancialSnapshot, MarketDataSource};
use research_prompt::PromptAssembler;
use research_utils::Settings;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Output of [`AnalystTeam::generate_report`]
#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub report_id: String,
    pub html: String,
    pub results: Vec<AnalysisResult>,
    pub snapshot: FinancialSnapshot,
    pub generated_at: DateTime<Utc>,
}

impl ReportOutcome {
    pub fn successful(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Mean quality over successful results
    pub fn average_quality(&self) -> f64 {
        let scores: Vec<f64> = self
            .results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.quality_score)
            .collect();
        if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }
}

/// Output of [`AnalystTeam::chat`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub conversation_id: String,
    pub analyst: AnalystKind,
    pub response: String,
    /// Turns in the conversation, this reply included
    pub messages: usize,
}

/// One [`StreamingAnalyst`] per [`AnalystKind`] plus the shared memory they
/// write to
pub struct AnalystTeam {
    analysts: HashMap<AnalystKind, StreamingAnalyst>,
    market: Arc<dyn MarketDataSource>,
    memory: Arc<SharedMemory>,
}

impl AnalystTeam {
    pub fn builder() -> AnalystTeamBuilder {
        AnalystTeamBuilder::new()
    }

    /// Team wired from settings: Yahoo market data behind the snapshot
    /// cache, built-in personas plus any configured overrides
    pub fn from_settings(settings: &Settings, llm: LlmClient) -> Result<Self> {
        let prompts = match &settings.prompts.override_dir {
            Some(dir) => PromptAssembler::with_overrides(dir)?,
            None => PromptAssembler::new()?,
        };
        Self::builder()
            .llm(llm)
            .market(Arc::new(CachedMarketData::from_settings(&settings.market)))
            .prompts(Arc::new(prompts))
            .config(AnalystConfig::from(&settings.llm))
            .build()
    }

    pub fn analyst(&self, kind: AnalystKind) -> Option<&StreamingAnalyst> {
        self.analysts.get(&kind)
    }

    pub fn memory(&self) -> &Arc<SharedMemory> {
        &self.memory
    }

    /// Per-analyst totals in roster order
    pub fn stats(&self) -> Vec<(AnalystKind, PerformanceStats)> {
        AnalystKind::ALL
            .into_iter()
            .filter_map(|kind| self.analysts.get(&kind).map(|a| (kind, a.stats())))
            .collect()
    }

    /// Run one analyst and keep its result
    pub async fn conduct_analysis(
        &self,
        kind: AnalystKind,
        context: &AnalysisContext,
        sink: Arc<dyn MessageSink>,
    ) -> Result<AnalysisResult> {
        let analyst = self
            .analysts
            .get(&kind)
            .ok_or_else(|| research_core::Error::UnknownAnalyst(kind.id().to_string()))?;

        notify(
            sink.as_ref(),
            StreamMessage::new(
                MessageKind::AnalysisStarted,
                json!({
                    "analyst": kind.id(),
                    "analyst_name": kind.name(),
                    "ticker": context.ticker(),
                    "company": context.company_name(),
                    "session_id": context.session_id(),
                }),
            ),
        )
        .await;

        let result = analyst.execute(context, sink.clone()).await;
        self.memory.store(context.ticker(), result.clone());

        if result.is_success() {
            notify(
                sink.as_ref(),
                StreamMessage::new(
                    MessageKind::StreamingAnalysisCompleted,
                    json!({
                        "analyst": kind.id(),
                        "ticker": context.ticker(),
                        "quality_score": result.quality_score,
                        "processing_time": result.processing_time,
                        "sources": result.data_sources,
                    }),
                ),
            )
            .await;
        }
        Ok(result)
    }

    /// Answer a follow-up question in one connection's chat with an analyst
    ///
    /// The analysis under discussion is the one the request carries, else
    /// the one the session already holds, else the analyst's stored result
    /// for the ticker. The reply streams as chunks tagged with the
    /// conversation id and is then sent whole as `chat_response`. A failed
    /// reply leaves the question in the history.
    pub async fn chat(
        &self,
        chats: &ChatStore,
        request: ChatRequest,
        sink: Arc<dyn MessageSink>,
    ) -> Result<ChatReply> {
        let kind = request.analyst;
        let analyst = self
            .analysts
            .get(&kind)
            .ok_or_else(|| research_core::Error::UnknownAnalyst(kind.id().to_string()))?;

        let session = chats.ask(&request, |ticker| {
            self.memory
                .get(ticker, &kind.agent_id())
                .and_then(|entry| entry.result.content().map(str::to_string))
        });
        debug!(
            "Chat {} turn {} (analysis: {})",
            session.conversation_id,
            session.messages.len(),
            session.analysis_content.is_some()
        );

        let relay = StreamRelay::new(sink.clone(), kind, &session.ticker, &session.company)
            .with_conversation(&session.conversation_id);
        let response = analyst
            .discuss(session.prompt(&request.message), &relay)
            .await?;
        let messages = chats.answer(kind, &response);

        let reply = ChatReply {
            conversation_id: session.conversation_id,
            analyst: kind,
            response,
            messages,
        };
        notify(
            sink.as_ref(),
            StreamMessage::new(
                MessageKind::ChatResponse,
                json!({
                    "response": reply.response,
                    "analyst": kind.id(),
                    "conversation_id": reply.conversation_id,
                    "messages": reply.messages,
                }),
            ),
        )
        .await;
        info!(
            "{} answered in chat {} ({} turns)",
            kind.name(),
            reply.conversation_id,
            reply.messages
        );
        Ok(reply)
    }

    /// Run `kinds` one after another and stitch the successful results into
    /// an HTML report
    ///
    /// Repeated kinds run once. Individual failures leave their slide out.
    pub async fn generate_report(
        &self,
        context: &AnalysisContext,
        kinds: &[AnalystKind],
        sink: Arc<dyn MessageSink>,
    ) -> Result<ReportOutcome> {
        let mut selected: Vec<AnalystKind> = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if !selected.contains(kind) {
                selected.push(*kind);
            }
        }
        if selected.is_empty() {
            return Err(EngineError::NoAnalysts);
        }

        info!(
            "Generating report for {} ({}) with {} analysts",
            context.company_name(),
            context.ticker(),
            selected.len()
        );

        let snapshot = match self.market.snapshot(context.ticker()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Report cover without market data for {}: {}", context.ticker(), e);
                FinancialSnapshot::empty(context.ticker())
            }
        };

        let mut results = Vec::with_capacity(selected.len());
        for kind in selected {
            results.push(self.conduct_analysis(kind, context, sink.clone()).await?);
        }

        let html = report::render_report(context, &snapshot, &results);
        let outcome = ReportOutcome {
            report_id: Uuid::new_v4().to_string(),
            html,
            results,
            snapshot,
            generated_at: Utc::now(),
        };

        let analysts: Vec<&str> = outcome
            .results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.analyst.id())
            .collect();
        notify(
            sink.as_ref(),
            StreamMessage::new(
                MessageKind::CompleteInvestmentReport,
                json!({
                    "report_id": outcome.report_id,
                    "ticker": context.ticker(),
                    "company": context.company_name(),
                    "html": outcome.html,
                    "analysts": analysts,
                }),
            ),
        )
        .await;
        notify(
            sink.as_ref(),
            StreamMessage::new(
                MessageKind::ReportCompleted,
                json!({
                    "report_id": outcome.report_id,
                    "ticker": context.ticker(),
                    "successful": outcome.successful(),
                    "failed": outcome.results.len() - outcome.successful(),
                    "average_quality": outcome.average_quality(),
                }),
            ),
        )
        .await;

        info!(
            "Report {} ready: {}/{} analysts succeeded",
            outcome.report_id,
            outcome.successful(),
            outcome.results.len()
        );
        Ok(outcome)
    }
}

impl std::fmt::Debug for AnalystTeam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalystTeam")
            .field("analysts", &self.analysts.len())
            .field("market", &self.market.name())
            .field("memory", &self.memory.len())
            .finish()
    }
}

async fn notify(sink: &dyn MessageSink, message: StreamMessage) {
    let kind = message.kind;
    if let Err(e) = sink.send(message).await {
        debug!("Dropped {:?} frame: {}", kind, e);
    }
}

/// Builder for [`AnalystTeam`]
pub struct AnalystTeamBuilder {
    llm: Option<LlmClient>,
    market: Option<Arc<dyn MarketDataSource>>,
    prompts: Option<Arc<PromptAssembler>>,
    memory: Option<Arc<SharedMemory>>,
    config: AnalystConfig,
}

impl AnalystTeamBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            market: None,
            prompts: None,
            memory: None,
            config: AnalystConfig::default(),
        }
    }

    pub fn llm(mut self, llm: LlmClient) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn market(mut self, market: Arc<dyn MarketDataSource>) -> Self {
        self.market = Some(market);
        self
    }

    /// Defaults to the built-in personas
    pub fn prompts(mut self, prompts: Arc<PromptAssembler>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn memory(mut self, memory: Arc<SharedMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn config(mut self, config: AnalystConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Build the team
    ///
    /// # Errors
    ///
    /// Returns an error if the LLM client or market source is not set
    pub fn build(self) -> Result<AnalystTeam> {
        let llm = self
            .llm
            .ok_or_else(|| EngineError::NotConfigured("LLM client not set".to_string()))?;
        let market = self
            .market
            .ok_or_else(|| EngineError::NotConfigured("market data source not set".to_string()))?;
        let prompts = match self.prompts {
            Some(prompts) => prompts,
            None => Arc::new(PromptAssembler::new()?),
        };

        let analysts = AnalystKind::ALL
            .into_iter()
            .map(|kind| {
                let analyst = StreamingAnalyst::new(
                    kind,
                    llm.clone(),
                    prompts.clone(),
                    market.clone(),
                    self.config.clone(),
                );
                (kind, analyst)
            })
            .collect();

        Ok(AnalystTeam {
            analysts,
            market,
            memory: self.memory.unwrap_or_default(),
        })
    }
}

impl Default for AnalystTeamBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, stream};
    use research_core::RecordingSink;
    use research_llm::{
        CompletionRequest, Credential, KeyPool, LLMError, MockLLMProvider, RetryPolicy,
        StreamEvent,
    };
    use research_market::MockMarketDataSource;

    fn context() -> AnalysisContext {
        AnalysisContext::builder("Acme Corp", "ACME").build().unwrap()
    }

    fn market() -> Arc<dyn MarketDataSource> {
        let mut market = MockMarketDataSource::new();
        market.expect_name().return_const("mock");
        market.expect_snapshot().returning(|ticker: &str| {
            Ok(FinancialSnapshot {
                symbol: ticker.to_string(),
                current_price: Some(42.0),
                ..Default::default()
            })
        });
        Arc::new(market)
    }

    /// Streams a short analysis for every persona except risk, which is
    /// refused
    fn provider() -> MockLLMProvider {
        let mut provider = MockLLMProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_stream()
            .returning(|_: &Credential, request: &CompletionRequest| {
                if request.prompt.contains("Senior Risk Management Analyst") {
                    return Err(LLMError::from_status(403, "blocked"));
                }
                Ok(stream::iter(vec![
                    Ok(StreamEvent::Text("## Findings\n".to_string())),
                    Ok(StreamEvent::Text("Margins are **stable** [1].".to_string())),
                ])
                .boxed())
            });
        provider
    }

    fn team() -> AnalystTeam {
        let keys = Arc::new(KeyPool::new(vec![Credential::new("key-a")]));
        let llm = LlmClient::new(Arc::new(provider()), keys, RetryPolicy::no_retry());
        AnalystTeam::builder().llm(llm).market(market()).build().unwrap()
    }

    #[test]
    fn test_builder_requires_llm() {
        let result = AnalystTeam::builder().market(market()).build();
        assert!(matches!(result, Err(EngineError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_conduct_analysis_stores_result() {
        let team = team();
        let sink = Arc::new(RecordingSink::new());

        let result = team
            .conduct_analysis(AnalystKind::Valuation, &context(), sink.clone())
            .await
            .unwrap();

        assert!(result.is_success());
        assert!(
            team.memory()
                .get("ACME", "streaming_valuation_analyst")
                .is_some()
        );

        let messages = sink.messages();
        assert_eq!(messages.first().unwrap().kind, MessageKind::AnalysisStarted);
        assert_eq!(
            messages.last().unwrap().kind,
            MessageKind::StreamingAnalysisCompleted
        );
    }

    #[tokio::test]
    async fn test_generate_report_in_order_skipping_failures() {
        let team = team();
        let sink = Arc::new(RecordingSink::new());
        let kinds = [
            AnalystKind::Fundamentals,
            AnalystKind::Risk,
            AnalystKind::Esg,
            AnalystKind::Fundamentals,
        ];

        let outcome = team
            .generate_report(&context(), &kinds, sink.clone())
            .await
            .unwrap();

        let order: Vec<_> = outcome.results.iter().map(|r| r.analyst).collect();
        assert_eq!(
            order,
            vec![AnalystKind::Fundamentals, AnalystKind::Risk, AnalystKind::Esg]
        );
        assert_eq!(outcome.successful(), 2);
        assert_eq!(outcome.html.matches("<div class=\"slide\">").count(), 3);
        assert!(outcome.html.contains("<h1 class=\"report-title\">Acme Corp</h1>"));
        assert!(outcome.html.contains("$42.00"));
        assert_eq!(team.memory().stats().entries, 3);

        let stats = team.stats();
        let risk = stats.iter().find(|(k, _)| *k == AnalystKind::Risk).unwrap().1;
        assert_eq!(risk.errors, 1);

        let messages = sink.messages();
        let tail: Vec<_> = messages[messages.len() - 2..].iter().map(|m| m.kind).collect();
        assert_eq!(
            tail,
            vec![
                MessageKind::CompleteInvestmentReport,
                MessageKind::ReportCompleted
            ]
        );
        assert_eq!(messages.last().unwrap().data["failed"], 1);
    }

    #[tokio::test]
    async fn test_chat_uses_stored_analysis() {
        let team = team();
        team.conduct_analysis(AnalystKind::Valuation, &context(), Arc::new(RecordingSink::new()))
            .await
            .unwrap();

        let chats = ChatStore::new("client-1");
        let sink = Arc::new(RecordingSink::new());
        let reply = team
            .chat(
                &chats,
                ChatRequest {
                    analyst: AnalystKind::Valuation,
                    message: "What multiple did you use?".into(),
                    ticker: "ACME".into(),
                    company: "Acme Corp".into(),
                    analysis_content: None,
                },
                sink.clone(),
            )
            .await
            .unwrap();

        assert_eq!(reply.conversation_id, "client-1_valuation");
        assert_eq!(reply.response, "## Findings\nMargins are **stable** [1].");
        assert_eq!(reply.messages, 2);
        assert_eq!(chats.history(AnalystKind::Valuation).len(), 2);

        let messages = sink.messages();
        assert!(
            messages[..messages.len() - 1]
                .iter()
                .all(|m| m.kind == MessageKind::StreamingAiContent
                    && m.data["conversation_id"] == "client-1_valuation")
        );
        let last = messages.last().unwrap();
        assert_eq!(last.kind, MessageKind::ChatResponse);
        assert_eq!(last.data["analyst"], "valuation");
    }

    #[tokio::test]
    async fn test_chat_failure_keeps_question() {
        let team = team();
        let chats = ChatStore::new("client-1");
        let result = team
            .chat(
                &chats,
                ChatRequest {
                    analyst: AnalystKind::Risk,
                    message: "What is the tail risk?".into(),
                    ticker: "ACME".into(),
                    company: "Acme Corp".into(),
                    analysis_content: None,
                },
                Arc::new(RecordingSink::new()),
            )
            .await;

        assert!(matches!(result, Err(EngineError::Llm(_))));
        assert_eq!(chats.history(AnalystKind::Risk).len(), 1);
    }

    #[tokio::test]
    async fn test_generate_report_requires_analysts() {
        let team = team();
        let result = team
            .generate_report(&context(), &[], Arc::new(RecordingSink::new()))
            .await;
        assert!(matches!(result, Err(EngineError::NoAnalysts)));
    }
}
