//! Shared application state

use research_core::{AnalysisContext, AnalystKind, DataSources, Error as CoreError};
use research_engine::AnalystTeam;
use research_export::DocumentExporter;
use research_llm::providers::{GeminiConfig, GeminiProvider};
use research_llm::{KeyPool, LlmClient, RetryPolicy};
use research_utils::Settings;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// Everything the handlers need, shared as [`SharedState`]
pub struct AppState {
    pub settings: Settings,
    pub keys: Arc<KeyPool>,
    pub team: Arc<AnalystTeam>,
    pub exporter: Arc<DocumentExporter>,
    started_at: Instant,
    connections: AtomicUsize,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        settings: Settings,
        keys: Arc<KeyPool>,
        team: AnalystTeam,
        exporter: DocumentExporter,
    ) -> Self {
        Self {
            settings,
            keys,
            team: Arc::new(team),
            exporter: Arc::new(exporter),
            started_at: Instant::now(),
            connections: AtomicUsize::new(0),
        }
    }

    /// Wire the Gemini provider, key pool, analyst team and exporter
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let keys = Arc::new(KeyPool::load(&settings.keys)?);
        if keys.is_empty() {
            warn!("No API keys loaded; analyses will fail until keys are added");
        } else {
            info!("Loaded {} API key(s)", keys.len());
        }

        let provider = GeminiProvider::with_config(GeminiConfig::from(&settings.llm))?;
        let llm = LlmClient::new(
            Arc::new(provider),
            keys.clone(),
            RetryPolicy::from(&settings.retry),
        );
        let team = AnalystTeam::from_settings(&settings, llm)?;
        let exporter = DocumentExporter::from_settings(&settings.export);
        Ok(Self::new(settings, keys, team, exporter))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn active_connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Count a connection until the guard drops
    pub fn connection_guard(self: &Arc<Self>) -> ConnectionGuard {
        self.connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard(self.clone())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("keys", &self.keys.len())
            .field("exporter", &self.exporter)
            .field("connections", &self.active_connections())
            .finish_non_exhaustive()
    }
}

/// Decrements the connection count on drop
pub struct ConnectionGuard(SharedState);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.connections.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Parse requested analyst ids; `None` or an empty list selects the whole
/// roster
pub fn parse_analysts(ids: Option<&[String]>) -> Result<Vec<AnalystKind>, CoreError> {
    match ids {
        Some(ids) if !ids.is_empty() => ids.iter().map(|id| id.parse()).collect(),
        _ => Ok(AnalystKind::ALL.to_vec()),
    }
}

/// Validated context for one request, with any supplied material attached
pub fn request_context(
    company: &str,
    ticker: &str,
    focus: Option<AnalystKind>,
    user_query: Option<&str>,
    sources: DataSources,
) -> Result<AnalysisContext, CoreError> {
    let mut builder = AnalysisContext::builder(company, ticker).data_sources(sources);
    if let Some(kind) = focus {
        builder = builder.focus(kind.id());
    }
    if let Some(query) = user_query {
        builder = builder.user_query(query);
    }
    builder.build()
}

#[cfg(test)]
pub(crate) mod testing {
    //! A state backed by mocks

    use super::*;
    use futures::{StreamExt, stream};
    use research_export::{MockPageRenderer, PageConfig};
    use research_llm::{CompletionRequest, Credential, LLMError, MockLLMProvider, StreamEvent};
    use research_market::{FinancialSnapshot, MarketDataSource, MockMarketDataSource};
    use std::path::Path;

    /// Every persona streams two chunks except risk, which is refused
    pub fn provider() -> MockLLMProvider {
        let mut provider = MockLLMProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_stream()
            .returning(|_: &Credential, request: &CompletionRequest| {
                if request.prompt.contains("Senior Risk Management Analyst") {
                    return Err(LLMError::from_status(403, "blocked"));
                }
                Ok(stream::iter(vec![
                    Ok(StreamEvent::Text("## Outlook\n".to_string())),
                    Ok(StreamEvent::Text("Demand is **firm**.".to_string())),
                ])
                .boxed())
            });
        provider
    }

    pub fn state(output_dir: &Path, renderer: MockPageRenderer) -> SharedState {
        state_with(output_dir, renderer, provider())
    }

    /// A state answering through `provider`
    pub fn state_with(
        output_dir: &Path,
        renderer: MockPageRenderer,
        provider: MockLLMProvider,
    ) -> SharedState {
        let mut market = MockMarketDataSource::new();
        market.expect_name().return_const("mock");
        market.expect_snapshot().returning(|ticker: &str| {
            Ok(FinancialSnapshot {
                symbol: ticker.to_string(),
                current_price: Some(42.0),
                ..Default::default()
            })
        });

        let keys = Arc::new(KeyPool::new(vec![Credential::new("key-a")]));
        let llm = LlmClient::new(Arc::new(provider), keys.clone(), RetryPolicy::no_retry());
        let market: Arc<dyn MarketDataSource> = Arc::new(market);
        let team = AnalystTeam::builder()
            .llm(llm)
            .market(market)
            .build()
            .unwrap();
        let exporter = DocumentExporter::new(output_dir, PageConfig::default(), Arc::new(renderer));

        Arc::new(AppState::new(Settings::default(), keys, team, exporter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysts() {
        assert_eq!(parse_analysts(None).unwrap().len(), 12);
        let empty: Vec<String> = Vec::new();
        assert_eq!(
            parse_analysts(Some(empty.as_slice())).unwrap(),
            AnalystKind::ALL.to_vec()
        );

        let ids = vec!["risk".to_string(), "chief".to_string()];
        assert_eq!(
            parse_analysts(Some(ids.as_slice())).unwrap(),
            vec![AnalystKind::Risk, AnalystKind::Chief]
        );

        let ids = vec!["quant".to_string()];
        assert!(matches!(
            parse_analysts(Some(ids.as_slice())),
            Err(CoreError::UnknownAnalyst(_))
        ));
    }

    #[test]
    fn test_request_context() {
        let context = request_context(
            "Acme Corp",
            "acme",
            Some(AnalystKind::Esg),
            Some("Water usage?"),
            DataSources {
                key_information: Some("Plant permits renewed".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(context.ticker(), "ACME");
        assert_eq!(context.analysis_focus(), ["esg"]);
        assert_eq!(context.user_query(), "Water usage?");
        assert_eq!(
            context.data_sources().unwrap().key_information.as_deref(),
            Some("Plant permits renewed")
        );

        let context =
            request_context("Acme Corp", "ACME", None, None, DataSources::default()).unwrap();
        assert!(context.data_sources().is_none());
        assert!(context.analysis_focus().is_empty());
    }

    #[test]
    fn test_connection_guard_counts() {
        let dir = tempfile::tempdir().unwrap();
        let state = testing::state(dir.path(), research_export::MockPageRenderer::new());
        {
            let _a = state.connection_guard();
            let _b = state.connection_guard();
            assert_eq!(state.active_connections(), 2);
        }
        assert_eq!(state.active_connections(), 0);
    }
}
