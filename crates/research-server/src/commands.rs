//! Subcommand implementations

use crate::http;
use crate::sink::ConsoleSink;
use crate::state::{AppState, parse_analysts, request_context};
use anyhow::{Context, bail};
use research_core::{AnalystKind, DataSources};
use research_export::{DocumentExporter, ExportFormat, ExportMeta};
use research_llm::KeyPool;
use research_utils::Settings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::KeysAction;

pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let address = format!("{}:{}", settings.server.host, settings.server.port);
    let state = Arc::new(AppState::from_settings(settings)?);
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Listening on http://{}", address);
    info!("WebSocket endpoint: ws://{}/ws/professional", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Supporting material from `--sources`, if given
pub async fn read_sources(path: Option<&Path>) -> anyhow::Result<DataSources> {
    let Some(path) = path else {
        return Ok(DataSources::default());
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(DataSources {
        data_sources: Some(text),
        ..Default::default()
    })
}

pub async fn analyze(
    settings: Settings,
    ticker: &str,
    company: &str,
    analyst: &str,
    query: Option<String>,
    sources: DataSources,
) -> anyhow::Result<()> {
    let kind: AnalystKind = analyst.parse()?;
    let context = request_context(company, ticker, Some(kind), query.as_deref(), sources)?;

    let state = AppState::from_settings(settings)?;
    let result = state
        .team
        .conduct_analysis(kind, &context, Arc::new(ConsoleSink))
        .await?;

    if !result.is_success() {
        bail!(
            "{} failed: {}",
            kind.name(),
            result.error_message.unwrap_or_default()
        );
    }
    eprintln!(
        "{}: quality {:.2}, {:.1}s, {} sources",
        kind.name(),
        result.quality_score,
        result.processing_time,
        result.data_sources.len()
    );
    Ok(())
}

pub async fn report(
    settings: Settings,
    ticker: &str,
    company: &str,
    analysts: &[String],
    out: Option<PathBuf>,
    sources: DataSources,
) -> anyhow::Result<()> {
    let kinds = parse_analysts(Some(analysts))?;
    let context = request_context(company, ticker, None, None, sources)?;

    let state = AppState::from_settings(settings)?;
    let outcome = state
        .team
        .generate_report(&context, &kinds, Arc::new(ConsoleSink))
        .await?;

    let path = match out {
        Some(path) => {
            tokio::fs::write(&path, &outcome.html)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            path
        }
        None => {
            let meta = ExportMeta::new(context.company_name(), context.ticker());
            state.exporter.save_html(&outcome.html, &meta).await?
        }
    };

    println!(
        "{} of {} analysts succeeded, average quality {:.2}",
        outcome.successful(),
        outcome.results.len(),
        outcome.average_quality()
    );
    println!("{}", path.display());
    Ok(())
}

pub async fn export(
    settings: &Settings,
    input: &Path,
    format: &str,
    ticker: &str,
    company: &str,
) -> anyhow::Result<()> {
    let format: ExportFormat = format.parse()?;
    let html = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;

    let exporter = DocumentExporter::from_settings(&settings.export);
    let path = exporter
        .export(&html, format, &ExportMeta::new(company, ticker))
        .await?;
    println!("{}", path.display());
    Ok(())
}

pub fn keys(settings: &Settings, action: &KeysAction) -> anyhow::Result<()> {
    let pool = KeyPool::load(&settings.keys)?;
    match action {
        KeysAction::Stats => {
            println!("{}", serde_json::to_string_pretty(&pool.stats())?);
        }
        KeysAction::Reload => {
            let total = pool.reload()?;
            println!("Reloaded {total} key(s)");
        }
        KeysAction::Add { key } => {
            let total = pool.add_key(key)?;
            println!("Added key, pool now holds {total} key(s)");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_sources() {
        assert!(read_sources(None).await.unwrap().is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, "Channel checks: inventory normalised")
            .await
            .unwrap();
        let sources = read_sources(Some(&path)).await.unwrap();
        assert_eq!(
            sources.data_sources.as_deref(),
            Some("Channel checks: inventory normalised")
        );

        assert!(read_sources(Some(&dir.path().join("missing.txt"))).await.is_err());
    }
}
