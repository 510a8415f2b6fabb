//! Renders persona prompts for an analysis context

use crate::{PromptBuilder, PromptRegistry, Result, personas};
use research_core::{AnalysisContext, AnalystKind};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::debug;

/// Formatted market metrics keyed by name (`current_price`, `rsi_14`, ...)
pub type Metrics = BTreeMap<String, String>;

/// Placeholder for a metric that could not be obtained
pub const NOT_AVAILABLE: &str = "N/A";

/// Metrics every persona template references directly
pub const TEMPLATE_METRICS: [&str; 9] = [
    "current_price",
    "market_cap",
    "week_52_low",
    "week_52_high",
    "return_1y",
    "volatility",
    "rsi_14",
    "sma_50",
    "sma_200",
];

/// Persona registry plus the variable mapping from [`AnalysisContext`]
#[derive(Debug)]
pub struct PromptAssembler {
    registry: PromptRegistry,
}

impl PromptAssembler {
    /// Assembler with the twelve built-in personas
    pub fn new() -> Result<Self> {
        let registry = PromptRegistry::new();
        registry.register_all(personas::builtin_templates()?);
        Ok(Self { registry })
    }

    /// Built-in personas, then any templates found in `dir` on top
    #[cfg(feature = "file-loader")]
    pub fn with_overrides(dir: &std::path::Path) -> Result<Self> {
        let assembler = Self::new()?;
        let loader = crate::FileLoader::new(dir);
        if loader.exists() {
            let overrides = loader.load_all()?;
            tracing::info!(
                "Loaded {} prompt override(s) from {}",
                overrides.len(),
                dir.display()
            );
            assembler.registry.register_all(overrides);
        } else {
            tracing::warn!("Prompt override directory {} not found", dir.display());
        }
        Ok(assembler)
    }

    pub fn registry(&self) -> &PromptRegistry {
        &self.registry
    }

    /// Render a template against a context and optional market metrics
    ///
    /// Metrics that are absent render as `N/A`.
    pub fn render(
        &self,
        template_id: &str,
        context: &AnalysisContext,
        metrics: Option<&Metrics>,
    ) -> Result<String> {
        let kind = template_id.parse::<AnalystKind>().ok();
        let vars = variables(kind, context, metrics);
        debug!(
            "Rendering prompt '{}' for {} ({})",
            template_id,
            context.company_name(),
            context.ticker()
        );
        self.registry.render(template_id, &vars)
    }

    /// Render the persona for an analyst kind
    pub fn render_for(
        &self,
        kind: AnalystKind,
        context: &AnalysisContext,
        metrics: Option<&Metrics>,
    ) -> Result<String> {
        self.render(kind.id(), context, metrics)
    }
}

/// Template variables for one render
pub fn variables(
    kind: Option<AnalystKind>,
    context: &AnalysisContext,
    metrics: Option<&Metrics>,
) -> Value {
    let mut vars = Map::new();
    vars.insert("company_name".into(), json!(context.company_name()));
    vars.insert("ticker".into(), json!(context.ticker()));
    vars.insert("user_query".into(), json!(context.user_query()));
    vars.insert(
        "analysis_focus".into(),
        json!(context.analysis_focus().join(", ")),
    );
    vars.insert("timestamp".into(), json!(context.formatted_timestamp()));
    vars.insert(
        "current_date".into(),
        json!(context.timestamp().format("%Y-%m-%d").to_string()),
    );
    vars.insert(
        "analyst_name".into(),
        json!(kind.map_or("Research Analyst", AnalystKind::name)),
    );
    vars.insert(
        "specialty".into(),
        json!(kind.map_or("", AnalystKind::specialty)),
    );

    for key in TEMPLATE_METRICS {
        let value = metrics
            .and_then(|m| m.get(key))
            .map_or(NOT_AVAILABLE, String::as_str);
        vars.insert(key.into(), json!(value));
    }
    if let Some(metrics) = metrics {
        for (key, value) in metrics {
            vars.entry(key.clone()).or_insert_with(|| json!(value));
        }
    }
    vars.insert(
        "financial_data".into(),
        json!(metrics.map(financial_block).unwrap_or_default()),
    );

    let sources = context.data_sources().filter(|s| !s.is_empty());
    vars.insert("has_user_context".into(), json!(sources.is_some()));
    vars.insert(
        "data_sources".into(),
        json!(sources.and_then(|s| s.data_sources.clone())),
    );
    vars.insert(
        "key_information".into(),
        json!(sources.and_then(|s| s.key_information.clone())),
    );
    vars.insert(
        "investment_context".into(),
        json!(sources.and_then(|s| s.investment_context.clone())),
    );

    Value::Object(vars)
}

/// Markdown block listing the metrics the template does not show inline
fn financial_block(metrics: &Metrics) -> String {
    let extra: Vec<(&String, &String)> = metrics
        .iter()
        .filter(|(key, _)| !TEMPLATE_METRICS.contains(&key.as_str()))
        .collect();
    if extra.is_empty() {
        return String::new();
    }

    extra
        .into_iter()
        .fold(
            PromptBuilder::new().subsection("Additional Market Data"),
            |builder, (key, value)| builder.field(label(key), value.as_str()),
        )
        .build_trimmed()
}

fn label(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use research_core::DataSources;

    fn context() -> AnalysisContext {
        AnalysisContext::builder("Acme Corp", "acme")
            .user_query("Is the margin recovery durable?")
            .analysis_focus(vec!["Margins".to_string(), "Cash flow".to_string()])
            .timestamp(Local.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_render_contains_company_and_ticker() {
        let assembler = PromptAssembler::new().unwrap();
        for kind in AnalystKind::ALL {
            let prompt = assembler.render_for(kind, &context(), None).unwrap();
            assert!(prompt.contains("Acme Corp"), "{kind} lacks company");
            assert!(prompt.contains("ACME"), "{kind} lacks ticker");
        }
    }

    #[test]
    fn test_missing_metrics_render_na() {
        let assembler = PromptAssembler::new().unwrap();
        let prompt = assembler.render("fundamentals", &context(), None).unwrap();

        assert!(prompt.contains("- Current price: N/A"));
        assert!(prompt.contains("- RSI (14): N/A"));
        assert!(!prompt.contains("Additional Market Data"));
    }

    #[test]
    fn test_metrics_substituted() {
        let mut metrics = Metrics::new();
        metrics.insert("current_price".into(), "$189.84".into());
        metrics.insert("market_cap".into(), "$2.95T".into());
        metrics.insert("beta".into(), "1.24".into());

        let assembler = PromptAssembler::new().unwrap();
        let prompt = assembler
            .render("valuation", &context(), Some(&metrics))
            .unwrap();

        assert!(prompt.contains("- Current price: $189.84"));
        assert!(prompt.contains("- Market cap: $2.95T"));
        assert!(prompt.contains("- Annualised volatility: N/A"));
        assert!(prompt.contains("- **Beta**: 1.24"));
    }

    #[test]
    fn test_query_focus_and_dates() {
        let assembler = PromptAssembler::new().unwrap();
        let prompt = assembler.render("chief", &context(), None).unwrap();

        assert!(prompt.contains("Is the margin recovery durable?"));
        assert!(prompt.contains("Focus areas: Margins, Cash flow"));
        assert!(prompt.contains("Analysis date: 2025-03-14 (prepared 2025-03-14 09:30:00)"));
        assert!(prompt.contains("Chief Investment Officer"));
    }

    #[test]
    fn test_default_request_when_query_empty() {
        let context = AnalysisContext::builder("Acme Corp", "ACME")
            .user_query("")
            .build()
            .unwrap();
        let vars = variables(Some(AnalystKind::Risk), &context, None);
        assert_eq!(vars["user_query"], "Comprehensive investment analysis");
    }

    #[test]
    fn test_user_context_block() {
        let with_sources = AnalysisContext::builder("Acme Corp", "ACME")
            .data_sources(DataSources {
                investment_context: Some("Activist stake disclosed".to_string()),
                ..Default::default()
            })
            .build()
            .unwrap();

        let assembler = PromptAssembler::new().unwrap();
        let prompt = assembler.render("management", &with_sources, None).unwrap();
        assert!(prompt.contains("User-Provided Context"));
        assert!(prompt.contains("- Investment context: Activist stake disclosed"));
        assert!(prompt.contains("- Data sources: Not provided"));

        let plain = assembler.render("management", &context(), None).unwrap();
        assert!(!plain.contains("User-Provided Context"));
    }

    #[test]
    fn test_unknown_template() {
        let assembler = PromptAssembler::new().unwrap();
        assert!(assembler.render("astrology", &context(), None).is_err());
    }
}
