//! Analysis context
//!
//! An [`AnalysisContext`] describes one company/ticker request. It is built
//! once through [`AnalysisContextBuilder`] and never mutated afterwards, so
//! it can be shared freely between the analysts of a report.

use crate::{Error, Result};
use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9.\-]{1,10}$").expect("ticker pattern is valid"));

/// Default query used when the client does not supply one
pub const DEFAULT_QUERY: &str = "Comprehensive investment analysis";

/// Check a ticker symbol (`AAPL`, `BRK.B`, `0700.HK`)
///
/// The symbol is upper-cased before matching.
pub fn validate_ticker(ticker: &str) -> bool {
    TICKER_RE.is_match(&ticker.trim().to_ascii_uppercase())
}

/// User-supplied material rendered into the prompt when present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSources {
    #[serde(default)]
    pub data_sources: Option<String>,
    #[serde(default)]
    pub key_information: Option<String>,
    #[serde(default)]
    pub investment_context: Option<String>,
}

impl DataSources {
    pub fn is_empty(&self) -> bool {
        [&self.data_sources, &self.key_information, &self.investment_context]
            .iter()
            .all(|field| field.as_deref().is_none_or(|s| s.trim().is_empty()))
    }
}

/// Immutable description of one analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisContext {
    company_name: String,
    ticker: String,
    user_query: String,
    analysis_focus: Vec<String>,
    timestamp: DateTime<Local>,
    session_id: String,
    data_sources: Option<DataSources>,
}

impl AnalysisContext {
    /// Start building a context for a company and ticker
    pub fn builder(
        company_name: impl Into<String>,
        ticker: impl Into<String>,
    ) -> AnalysisContextBuilder {
        AnalysisContextBuilder::new(company_name, ticker)
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    /// Upper-cased ticker symbol
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn user_query(&self) -> &str {
        &self.user_query
    }

    pub fn analysis_focus(&self) -> &[String] {
        &self.analysis_focus
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn data_sources(&self) -> Option<&DataSources> {
        self.data_sources.as_ref()
    }

    /// `%Y-%m-%d %H:%M:%S` rendering of the creation time
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Builder for [`AnalysisContext`]
#[derive(Debug, Clone)]
pub struct AnalysisContextBuilder {
    company_name: String,
    ticker: String,
    user_query: Option<String>,
    analysis_focus: Vec<String>,
    timestamp: Option<DateTime<Local>>,
    session_id: Option<String>,
    data_sources: Option<DataSources>,
}

impl AnalysisContextBuilder {
    pub fn new(company_name: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            ticker: ticker.into(),
            user_query: None,
            analysis_focus: Vec::new(),
            timestamp: None,
            session_id: None,
            data_sources: None,
        }
    }

    pub fn user_query(mut self, query: impl Into<String>) -> Self {
        self.user_query = Some(query.into());
        self
    }

    pub fn focus(mut self, area: impl Into<String>) -> Self {
        self.analysis_focus.push(area.into());
        self
    }

    pub fn analysis_focus(mut self, areas: Vec<String>) -> Self {
        self.analysis_focus = areas;
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach user-provided material; empty blocks are dropped
    pub fn data_sources(mut self, sources: DataSources) -> Self {
        self.data_sources = (!sources.is_empty()).then_some(sources);
        self
    }

    /// Validate and build the context
    ///
    /// Company and ticker must be non-empty and the ticker must look like a
    /// listed symbol.
    pub fn build(self) -> Result<AnalysisContext> {
        let company_name = self.company_name.trim().to_string();
        let ticker = self.ticker.trim().to_ascii_uppercase();

        if company_name.is_empty() {
            return Err(Error::InvalidContext("company name is required".to_string()));
        }
        if ticker.is_empty() {
            return Err(Error::InvalidContext("ticker is required".to_string()));
        }
        if !validate_ticker(&ticker) {
            return Err(Error::InvalidContext(format!("invalid ticker symbol: {ticker}")));
        }

        let timestamp = self.timestamp.unwrap_or_else(Local::now);
        let session_id = self
            .session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("{ticker}_{}", timestamp.format("%Y%m%d_%H%M%S")));
        let user_query = self
            .user_query
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_QUERY.to_string());

        Ok(AnalysisContext {
            company_name,
            ticker,
            user_query,
            analysis_focus: self.analysis_focus,
            timestamp,
            session_id,
            data_sources: self.data_sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_build_defaults() {
        let ts = Local.with_ymd_and_hms(2025, 3, 14, 9, 30, 5).unwrap();
        let ctx = AnalysisContext::builder("Acme Corp", "acme")
            .timestamp(ts)
            .build()
            .unwrap();

        assert_eq!(ctx.company_name(), "Acme Corp");
        assert_eq!(ctx.ticker(), "ACME");
        assert_eq!(ctx.user_query(), DEFAULT_QUERY);
        assert_eq!(ctx.session_id(), "ACME_20250314_093005");
        assert_eq!(ctx.formatted_timestamp(), "2025-03-14 09:30:05");
        assert!(ctx.data_sources().is_none());
    }

    #[test]
    fn test_build_rejects_empty_fields() {
        assert!(matches!(
            AnalysisContext::builder("  ", "AAPL").build(),
            Err(Error::InvalidContext(_))
        ));
        assert!(matches!(
            AnalysisContext::builder("Apple", "").build(),
            Err(Error::InvalidContext(_))
        ));
    }

    #[test]
    fn test_ticker_validation() {
        assert!(validate_ticker("AAPL"));
        assert!(validate_ticker("brk.b"));
        assert!(validate_ticker("0700.HK"));
        assert!(validate_ticker("RDS-A"));
        assert!(!validate_ticker("TOO-LONG-TICKER"));
        assert!(!validate_ticker("A B"));
        assert!(!validate_ticker("$$"));
    }

    #[test]
    fn test_explicit_session_and_focus() {
        let ctx = AnalysisContext::builder("Apple Inc.", "AAPL")
            .session_id("client-7")
            .focus("valuation")
            .focus("risk")
            .user_query("Is the buyback sustainable?")
            .build()
            .unwrap();

        assert_eq!(ctx.session_id(), "client-7");
        assert_eq!(ctx.analysis_focus(), ["valuation", "risk"]);
        assert_eq!(ctx.user_query(), "Is the buyback sustainable?");
    }

    #[test]
    fn test_empty_data_sources_dropped() {
        let ctx = AnalysisContext::builder("Apple Inc.", "AAPL")
            .data_sources(DataSources {
                data_sources: Some("   ".to_string()),
                ..Default::default()
            })
            .build()
            .unwrap();
        assert!(ctx.data_sources().is_none());
    }
}
