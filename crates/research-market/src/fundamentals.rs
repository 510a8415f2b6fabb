//! Valuation and profitability figures from Alpha Vantage's company overview

use crate::error::{MarketError, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use research_core::validate_ticker;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, instrument};

const BASE_URL: &str = "https://www.alphavantage.co/query";

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Company fundamentals; margins, yields and growth rates are fractions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub price_to_book: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub ev_to_ebitda: Option<f64>,
    pub eps: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub profit_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub beta: Option<f64>,
    pub analyst_target: Option<f64>,
}

/// Raw `OVERVIEW` response; Alpha Vantage sends every figure as a string
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompanyOverview {
    #[serde(default)]
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    #[serde(rename = "MarketCapitalization")]
    pub market_cap: Option<String>,
    #[serde(rename = "RevenueTTM")]
    pub revenue_ttm: Option<String>,
    #[serde(rename = "PERatio")]
    pub pe_ratio: Option<String>,
    #[serde(rename = "TrailingPE")]
    pub trailing_pe: Option<String>,
    #[serde(rename = "ForwardPE")]
    pub forward_pe: Option<String>,
    #[serde(rename = "PEGRatio")]
    pub peg_ratio: Option<String>,
    pub price_to_book_ratio: Option<String>,
    #[serde(rename = "PriceToSalesRatioTTM")]
    pub price_to_sales: Option<String>,
    #[serde(rename = "EVToRevenue")]
    pub ev_to_revenue: Option<String>,
    #[serde(rename = "EVToEBITDA")]
    pub ev_to_ebitda: Option<String>,
    #[serde(rename = "EPS")]
    pub eps: Option<String>,
    pub dividend_yield: Option<String>,
    pub profit_margin: Option<String>,
    #[serde(rename = "OperatingMarginTTM")]
    pub operating_margin: Option<String>,
    #[serde(rename = "ReturnOnEquityTTM")]
    pub return_on_equity: Option<String>,
    #[serde(rename = "ReturnOnAssetsTTM")]
    pub return_on_assets: Option<String>,
    #[serde(rename = "QuarterlyRevenueGrowthYOY")]
    pub revenue_growth: Option<String>,
    #[serde(rename = "QuarterlyEarningsGrowthYOY")]
    pub earnings_growth: Option<String>,
    pub beta: Option<String>,
    pub analyst_target_price: Option<String>,
}

/// `"None"`, `"-"` and other non-numbers are missing values
fn number(raw: &Option<String>) -> Option<f64> {
    raw.as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn text(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "None" && *s != "-")
        .map(String::from)
}

impl From<&CompanyOverview> for Fundamentals {
    fn from(o: &CompanyOverview) -> Self {
        let enterprise_value = number(&o.ev_to_revenue)
            .zip(number(&o.revenue_ttm))
            .map(|(multiple, revenue)| multiple * revenue);
        Self {
            sector: text(&o.sector),
            industry: text(&o.industry),
            market_cap: number(&o.market_cap),
            enterprise_value,
            pe_ratio: number(&o.trailing_pe).or_else(|| number(&o.pe_ratio)),
            forward_pe: number(&o.forward_pe),
            peg_ratio: number(&o.peg_ratio),
            price_to_book: number(&o.price_to_book_ratio),
            price_to_sales: number(&o.price_to_sales),
            ev_to_ebitda: number(&o.ev_to_ebitda),
            eps: number(&o.eps),
            dividend_yield: number(&o.dividend_yield),
            profit_margin: number(&o.profit_margin),
            operating_margin: number(&o.operating_margin),
            return_on_equity: number(&o.return_on_equity),
            return_on_assets: number(&o.return_on_assets),
            revenue_growth: number(&o.revenue_growth),
            earnings_growth: number(&o.earnings_growth),
            beta: number(&o.beta),
            analyst_target: number(&o.analyst_target_price),
        }
    }
}

/// Something that can produce [`Fundamentals`] for a ticker
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    async fn fundamentals(&self, ticker: &str) -> Result<Fundamentals>;

    fn name(&self) -> &'static str;
}

/// Alpha Vantage client limited to the `OVERVIEW` function
#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
}

impl AlphaVantageClient {
    /// `requests_per_minute` is 5 on the free tier
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        }
    }

    /// Company overview for `symbol`
    #[instrument(skip(self))]
    pub async fn company_overview(&self, symbol: &str) -> Result<CompanyOverview> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "OVERVIEW"),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;
        let data: Value = response.json().await?;
        parse_overview(symbol, data)
    }
}

/// Turn an `OVERVIEW` body into a [`CompanyOverview`], mapping the error
/// shapes Alpha Vantage returns with a 200 status
pub fn parse_overview(symbol: &str, data: Value) -> Result<CompanyOverview> {
    if let Some(error) = data.get("Error Message") {
        return Err(MarketError::AlphaVantageError(error.to_string()));
    }
    if data.get("Note").is_some() || data.get("Information").is_some() {
        return Err(MarketError::RateLimitExceeded {
            provider: "Alpha Vantage".to_string(),
        });
    }
    if data.as_object().is_none_or(|o| o.is_empty()) {
        return Err(MarketError::InvalidSymbol(symbol.to_string()));
    }
    Ok(serde_json::from_value(data)?)
}

impl std::fmt::Debug for AlphaVantageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl FundamentalsSource for AlphaVantageClient {
    async fn fundamentals(&self, ticker: &str) -> Result<Fundamentals> {
        if !validate_ticker(ticker) {
            return Err(MarketError::InvalidSymbol(ticker.to_string()));
        }
        let overview = self
            .company_overview(&ticker.trim().to_ascii_uppercase())
            .await?;
        debug!("Fundamentals for {} ({:?})", overview.symbol, overview.name);
        Ok(Fundamentals::from(&overview))
    }

    fn name(&self) -> &'static str {
        "alpha-vantage"
    }
}
