//! HTTP routes

use crate::error::{ApiError, ApiResult};
use crate::state::{SharedState, parse_analysts, request_context};
use crate::ws;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use research_core::{AnalysisResult, AnalystKind, DataSources, NullSink};
use research_export::{ExportFormat, ExportMeta};
use research_llm::KeyPoolStats;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// All routes plus the CORS and trace layers
pub fn router(state: SharedState) -> Router {
    let cors = cors_layer(&state.settings.server.cors_origins);
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/professional/analyze", post(analyze))
        .route("/api/professional/report", post(report))
        .route("/api/professional/convert", post(convert))
        .route("/api/professional/analysts", get(analysts))
        .route("/api/keys", post(add_key))
        .route("/api/keys/stats", get(key_stats))
        .route("/api/keys/reload", post(reload_keys))
        .route("/ws/professional", get(ws::upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

async fn root(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "service": "research-rs investment research server",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.settings.llm.model,
        "endpoints": {
            "websocket": "/ws/professional",
            "analyze": "/api/professional/analyze",
            "report": "/api/professional/report",
            "convert": "/api/professional/convert",
            "analysts": "/api/professional/analysts",
            "health": "/health",
        },
    }))
}

async fn health(State(state): State<SharedState>) -> Json<Value> {
    let memory = state.team.memory().stats();
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_secs": state.uptime_secs(),
        "active_connections": state.active_connections(),
        "api_keys": state.keys.len(),
        "stored_results": memory.entries,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub ticker: String,
    pub company_name: String,
    #[serde(default = "default_analyst_type")]
    pub analyst_type: String,
    #[serde(default)]
    pub user_query: Option<String>,
    /// Optional `data_sources`, `key_information` and `investment_context`
    #[serde(flatten)]
    pub sources: DataSources,
}

fn default_analyst_type() -> String {
    AnalystKind::Chief.id().to_string()
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub status: &'static str,
    pub analyst_type: String,
    pub analysis_id: String,
    pub quality_score: f64,
    pub processing_time: f64,
    pub content: Option<String>,
    pub sources: Vec<String>,
}

async fn analyze(
    State(state): State<SharedState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let kind: AnalystKind = request.analyst_type.parse()?;
    let context = request_context(
        &request.company_name,
        &request.ticker,
        Some(kind),
        request.user_query.as_deref(),
        request.sources,
    )?;

    let result = state
        .team
        .conduct_analysis(kind, &context, Arc::new(NullSink))
        .await?;
    if !result.is_success() {
        return Err(ApiError::Internal(
            result
                .error_message
                .unwrap_or_else(|| "Analysis failed".to_string()),
        ));
    }

    Ok(Json(AnalyzeResponse {
        status: "success",
        analyst_type: kind.id().to_string(),
        content: result.content().map(str::to_string),
        analysis_id: result.agent_id,
        quality_score: result.quality_score,
        processing_time: result.processing_time,
        sources: result.data_sources,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub ticker: String,
    pub company_name: String,
    #[serde(default)]
    pub analysts: Option<Vec<String>>,
    #[serde(default)]
    pub user_query: Option<String>,
    #[serde(flatten)]
    pub sources: DataSources,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub status: &'static str,
    pub report_id: String,
    pub html: String,
    pub results: Vec<AnalysisResult>,
    pub generation_time: String,
}

async fn report(
    State(state): State<SharedState>,
    Json(request): Json<ReportRequest>,
) -> ApiResult<Json<ReportResponse>> {
    let kinds = parse_analysts(request.analysts.as_deref())?;
    let context = request_context(
        &request.company_name,
        &request.ticker,
        None,
        request.user_query.as_deref(),
        request.sources,
    )?;

    let outcome = state
        .team
        .generate_report(&context, &kinds, Arc::new(NullSink))
        .await?;

    Ok(Json(ReportResponse {
        status: "success",
        report_id: outcome.report_id,
        html: outcome.html,
        results: outcome.results,
        generation_time: outcome.generated_at.to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub html_content: String,
    pub company_name: String,
    pub ticker: String,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    ExportFormat::Word.to_string()
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub status: &'static str,
    pub format: ExportFormat,
    pub file_path: String,
    pub message: String,
}

async fn convert(
    State(state): State<SharedState>,
    Json(request): Json<ConvertRequest>,
) -> ApiResult<Json<ConvertResponse>> {
    let format: ExportFormat = request.format.parse()?;
    info!("Converting HTML to {} for {}", format, request.ticker);

    let meta = ExportMeta::new(&request.company_name, &request.ticker);
    let path = state.exporter.export(&request.html_content, format, &meta).await?;

    Ok(Json(ConvertResponse {
        status: "success",
        format,
        file_path: path.display().to_string(),
        message: format!("{} document generated for {}", format, meta.ticker),
    }))
}

async fn analysts(State(state): State<SharedState>) -> Json<Value> {
    let stats = state.team.stats();
    let roster: Vec<Value> = AnalystKind::ALL
        .into_iter()
        .map(|kind| {
            let performance = stats
                .iter()
                .find(|(k, _)| *k == kind)
                .map(|(_, s)| json!({
                    "executions": s.executions,
                    "success_rate": s.success_rate(),
                    "average_time": s.average_time(),
                }));
            json!({
                "id": kind.id(),
                "name": kind.name(),
                "specialty": kind.specialty(),
                "focus_areas": kind.focus_areas(),
                "performance": performance,
            })
        })
        .collect();
    Json(json!({ "status": "success", "analysts": roster }))
}

async fn key_stats(State(state): State<SharedState>) -> Json<KeyPoolStats> {
    Json(state.keys.stats())
}

async fn reload_keys(State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    let total = state.keys.reload()?;
    Ok(Json(json!({ "status": "success", "total_keys": total })))
}

#[derive(Debug, Deserialize)]
pub struct AddKeyRequest {
    pub key: String,
}

async fn add_key(
    State(state): State<SharedState>,
    Json(request): Json<AddKeyRequest>,
) -> ApiResult<Json<Value>> {
    let total = state.keys.add_key(&request.key)?;
    Ok(Json(json!({ "status": "success", "total_keys": total })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing;
    use futures::StreamExt;
    use research_export::MockPageRenderer;
    use research_llm::{CompletionRequest, Credential, MockLLMProvider, StreamEvent};

    #[tokio::test]
    async fn test_analyze_success() {
        let dir = tempfile::tempdir().unwrap();
        let state = testing::state(dir.path(), MockPageRenderer::new());

        let Json(response) = analyze(
            State(state.clone()),
            Json(AnalyzeRequest {
                ticker: "acme".into(),
                company_name: "Acme Corp".into(),
                analyst_type: "valuation".into(),
                user_query: None,
                sources: DataSources::default(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.status, "success");
        assert_eq!(response.analysis_id, "streaming_valuation_analyst");
        assert_eq!(
            response.content.as_deref(),
            Some("## Outlook\nDemand is **firm**.")
        );
        assert_eq!(state.team.memory().len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_passes_supplied_material_to_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = MockLLMProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_stream()
            .withf(|_: &Credential, request: &CompletionRequest| {
                request.prompt.contains("Q3 channel checks show restocking")
                    && request.prompt.contains("Activist stake disclosed")
            })
            .times(1)
            .returning(|_: &Credential, _: &CompletionRequest| {
                Ok(futures::stream::iter(vec![Ok(StreamEvent::Text(
                    "Restocking supports the outlook.".to_string(),
                ))])
                .boxed())
            });
        let state = testing::state_with(dir.path(), MockPageRenderer::new(), provider);

        let request: AnalyzeRequest = serde_json::from_value(json!({
            "ticker": "ACME",
            "company_name": "Acme Corp",
            "analyst_type": "industry",
            "data_sources": "Q3 channel checks show restocking",
            "investment_context": "Activist stake disclosed",
        }))
        .unwrap();
        assert_eq!(
            request.sources.data_sources.as_deref(),
            Some("Q3 channel checks show restocking")
        );

        let Json(response) = analyze(State(state), Json(request)).await.unwrap();
        assert_eq!(
            response.content.as_deref(),
            Some("Restocking supports the outlook.")
        );
    }

    #[tokio::test]
    async fn test_analyze_rejects_unknown_analyst() {
        let dir = tempfile::tempdir().unwrap();
        let state = testing::state(dir.path(), MockPageRenderer::new());

        let result = analyze(
            State(state),
            Json(AnalyzeRequest {
                ticker: "ACME".into(),
                company_name: "Acme Corp".into(),
                analyst_type: "quant".into(),
                user_query: None,
                sources: DataSources::default(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_failed_analysis_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = testing::state(dir.path(), MockPageRenderer::new());

        let result = analyze(
            State(state),
            Json(AnalyzeRequest {
                ticker: "ACME".into(),
                company_name: "Acme Corp".into(),
                analyst_type: "risk".into(),
                user_query: None,
                sources: DataSources::default(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }

    #[tokio::test]
    async fn test_report_with_selected_analysts() {
        let dir = tempfile::tempdir().unwrap();
        let state = testing::state(dir.path(), MockPageRenderer::new());

        let Json(response) = report(
            State(state),
            Json(ReportRequest {
                ticker: "ACME".into(),
                company_name: "Acme Corp".into(),
                analysts: Some(vec!["industry".into(), "risk".into()]),
                user_query: None,
                sources: DataSources::default(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.results.len(), 2);
        assert!(response.html.contains("report-title"));
        assert!(response.results[0].is_success());
        assert!(!response.results[1].is_success());
    }

    #[tokio::test]
    async fn test_convert_word_and_bad_format() {
        let dir = tempfile::tempdir().unwrap();
        let state = testing::state(dir.path(), MockPageRenderer::new());

        let Json(response) = convert(
            State(state.clone()),
            Json(ConvertRequest {
                html_content: r#"<div class="slide"><h1 class="report-title">Acme Corp</h1></div>"#
                    .into(),
                company_name: "Acme Corp".into(),
                ticker: "ACME".into(),
                format: "word".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.format, ExportFormat::Word);
        assert!(response.file_path.ends_with(".docx"));
        assert!(std::path::Path::new(&response.file_path).exists());

        let result = convert(
            State(state),
            Json(ConvertRequest {
                html_content: "<p>x</p>".into(),
                company_name: "Acme Corp".into(),
                ticker: "ACME".into(),
                format: "pptx".into(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_add_key_validates_format() {
        let dir = tempfile::tempdir().unwrap();
        let state = testing::state(dir.path(), MockPageRenderer::new());

        let result = add_key(
            State(state.clone()),
            Json(AddKeyRequest {
                key: "not-a-key".into(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));

        let Json(body) = add_key(
            State(state.clone()),
            Json(AddKeyRequest {
                key: format!("AIzaSy{}", "A".repeat(33)),
            }),
        )
        .await
        .unwrap();
        assert_eq!(body["total_keys"], 2);
        assert_eq!(key_stats(State(state)).await.0.total_keys, 2);
    }

    #[tokio::test]
    async fn test_analysts_roster() {
        let dir = tempfile::tempdir().unwrap();
        let state = testing::state(dir.path(), MockPageRenderer::new());
        let Json(body) = analysts(State(state)).await;
        let roster = body["analysts"].as_array().unwrap();
        assert_eq!(roster.len(), 12);
        assert_eq!(roster[0]["id"], "chief");
    }

    #[test]
    fn test_router_builds() {
        let dir = tempfile::tempdir().unwrap();
        let _ = router(testing::state(dir.path(), MockPageRenderer::new()));
    }
}
