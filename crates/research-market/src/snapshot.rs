//! Point-in-time market metrics for one ticker

use crate::error::{MarketError, Result};
use crate::format::{format_currency, format_percentage, format_price, format_ratio};
use crate::fundamentals::Fundamentals;
use crate::indicators::{self, TRADING_DAYS};
use crate::yahoo::Quote;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics derived from daily history
///
/// Every figure is optional: a snapshot built from a short history simply
/// leaves the longer-window indicators empty, and [`FinancialSnapshot::empty`]
/// stands in when market data could not be fetched at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub symbol: String,
    pub as_of: Option<DateTime<Utc>>,
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub day_change: Option<f64>,
    pub market_cap: Option<f64>,
    pub week_52_high: Option<f64>,
    pub week_52_low: Option<f64>,
    pub return_1y: Option<f64>,
    pub volatility: Option<f64>,
    pub rsi_14: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub average_volume: Option<f64>,
    /// Valuation figures from a fundamentals provider, empty without one
    #[serde(default)]
    pub fundamentals: Fundamentals,
}

impl FinancialSnapshot {
    /// A snapshot with no data
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Compute metrics from daily bars, oldest first
    pub fn from_quotes(symbol: &str, quotes: &[Quote]) -> Result<Self> {
        let quotes: Vec<&Quote> = quotes
            .iter()
            .filter(|q| q.close.is_finite() && q.close > 0.0)
            .collect();
        let Some(last) = quotes.last() else {
            return Err(MarketError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "No historical data available".to_string(),
            });
        };

        let closes: Vec<f64> = quotes.iter().map(|q| q.close).collect();
        let year = &quotes[quotes.len().saturating_sub(TRADING_DAYS)..];
        let year_closes = &closes[closes.len().saturating_sub(TRADING_DAYS + 1)..];

        let previous_close = closes.len().checked_sub(2).map(|i| closes[i]);
        let recent_volume = &quotes[quotes.len().saturating_sub(20)..];

        Ok(Self {
            symbol: symbol.to_string(),
            as_of: Some(last.timestamp),
            current_price: Some(last.close),
            previous_close,
            day_change: previous_close.map(|prev| last.close / prev - 1.0),
            market_cap: None,
            week_52_high: year.iter().map(|q| q.high.max(q.close)).reduce(f64::max),
            week_52_low: year
                .iter()
                .map(|q| if q.low > 0.0 { q.low.min(q.close) } else { q.close })
                .reduce(f64::min),
            return_1y: indicators::period_return(year_closes),
            volatility: indicators::annualised_volatility(year_closes),
            rsi_14: indicators::rsi(&closes, 14)?,
            sma_50: indicators::sma(&closes, 50)?,
            sma_200: indicators::sma(&closes, 200)?,
            average_volume: Some(
                recent_volume.iter().map(|q| q.volume as f64).sum::<f64>()
                    / recent_volume.len() as f64,
            ),
            fundamentals: Fundamentals::default(),
        })
    }

    /// Attach fundamentals; their market cap replaces the snapshot's
    pub fn with_fundamentals(mut self, fundamentals: Fundamentals) -> Self {
        if fundamentals.market_cap.is_some() {
            self.market_cap = fundamentals.market_cap;
        }
        self.fundamentals = fundamentals;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.current_price.is_none()
    }

    /// Formatted metrics keyed by template variable name
    ///
    /// Missing figures are omitted; renderers substitute `N/A` for them.
    pub fn metrics(&self) -> BTreeMap<String, String> {
        let entries = [
            ("current_price", self.current_price.map(|v| format_price(Some(v)))),
            ("previous_close", self.previous_close.map(|v| format_price(Some(v)))),
            ("day_change", self.day_change.map(|v| format_percentage(Some(v)))),
            ("market_cap", self.market_cap.map(|v| format_currency(Some(v)))),
            ("week_52_high", self.week_52_high.map(|v| format_price(Some(v)))),
            ("week_52_low", self.week_52_low.map(|v| format_price(Some(v)))),
            ("return_1y", self.return_1y.map(|v| format_percentage(Some(v)))),
            ("volatility", self.volatility.map(|v| format_percentage(Some(v)))),
            ("rsi_14", self.rsi_14.map(|v| format_ratio(Some(v)))),
            ("sma_50", self.sma_50.map(|v| format_price(Some(v)))),
            ("sma_200", self.sma_200.map(|v| format_price(Some(v)))),
        ];
        let f = &self.fundamentals;
        let valuation = [
            ("sector", f.sector.clone()),
            ("industry", f.industry.clone()),
            ("enterprise_value", f.enterprise_value.map(|v| format_currency(Some(v)))),
            ("pe_ratio", f.pe_ratio.map(|v| format_ratio(Some(v)))),
            ("forward_pe", f.forward_pe.map(|v| format_ratio(Some(v)))),
            ("peg_ratio", f.peg_ratio.map(|v| format_ratio(Some(v)))),
            ("price_to_book", f.price_to_book.map(|v| format_ratio(Some(v)))),
            ("price_to_sales", f.price_to_sales.map(|v| format_ratio(Some(v)))),
            ("ev_to_ebitda", f.ev_to_ebitda.map(|v| format_ratio(Some(v)))),
            ("eps", f.eps.map(|v| format_price(Some(v)))),
            ("dividend_yield", f.dividend_yield.map(|v| format_percentage(Some(v)))),
            ("profit_margin", f.profit_margin.map(|v| format_percentage(Some(v)))),
            ("operating_margin", f.operating_margin.map(|v| format_percentage(Some(v)))),
            ("return_on_equity", f.return_on_equity.map(|v| format_percentage(Some(v)))),
            ("return_on_assets", f.return_on_assets.map(|v| format_percentage(Some(v)))),
            ("revenue_growth", f.revenue_growth.map(|v| format_percentage(Some(v)))),
            ("earnings_growth", f.earnings_growth.map(|v| format_percentage(Some(v)))),
            ("beta", f.beta.map(|v| format_ratio(Some(v)))),
            ("analyst_target", f.analyst_target.map(|v| format_price(Some(v)))),
        ];

        entries
            .into_iter()
            .chain(valuation)
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
            .collect()
    }

    /// Labelled figures for a report's 5x5 metrics grid, `N/A` where missing
    pub fn display_metrics(&self) -> Vec<(&'static str, String)> {
        let f = &self.fundamentals;
        vec![
            ("Current Price", format_price(self.current_price)),
            ("Day Change", format_percentage(self.day_change)),
            ("Market Cap", format_currency(self.market_cap)),
            ("Enterprise Value", format_currency(f.enterprise_value)),
            ("52W High", format_price(self.week_52_high)),
            ("52W Low", format_price(self.week_52_low)),
            ("1Y Return", format_percentage(self.return_1y)),
            ("Volatility", format_percentage(self.volatility)),
            ("Beta", format_ratio(f.beta)),
            ("RSI (14)", format_ratio(self.rsi_14)),
            ("P/E", format_ratio(f.pe_ratio)),
            ("Forward P/E", format_ratio(f.forward_pe)),
            ("PEG", format_ratio(f.peg_ratio)),
            ("P/B", format_ratio(f.price_to_book)),
            ("P/S", format_ratio(f.price_to_sales)),
            ("EV/EBITDA", format_ratio(f.ev_to_ebitda)),
            ("EPS", format_price(f.eps)),
            ("Dividend Yield", format_percentage(f.dividend_yield)),
            ("Profit Margin", format_percentage(f.profit_margin)),
            ("Operating Margin", format_percentage(f.operating_margin)),
            ("ROE", format_percentage(f.return_on_equity)),
            ("ROA", format_percentage(f.return_on_assets)),
            ("Revenue Growth", format_percentage(f.revenue_growth)),
            ("Earnings Growth", format_percentage(f.earnings_growth)),
            ("Analyst Target", format_price(f.analyst_target)),
        ]
    }

    pub fn rsi_signal(&self) -> Option<&'static str> {
        self.rsi_14.map(indicators::interpret_rsi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn quotes(closes: &[f64]) -> Vec<Quote> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Quote {
                symbol: "ACME".to_string(),
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000_000,
                adjclose: close,
            })
            .collect()
    }

    #[test]
    fn test_from_quotes() {
        let closes: Vec<f64> = (0..260_i32).map(|i| 100.0 + f64::from(i) * 0.5).collect();
        let snapshot = FinancialSnapshot::from_quotes("ACME", &quotes(&closes)).unwrap();

        assert_eq!(snapshot.current_price, Some(229.5));
        assert_eq!(snapshot.previous_close, Some(229.0));
        assert_eq!(snapshot.week_52_high, Some(230.5));
        assert!(snapshot.return_1y.unwrap() > 0.0);
        assert!(snapshot.sma_50.is_some());
        assert!(snapshot.sma_200.is_some());
        assert_eq!(snapshot.rsi_signal(), Some("Overbought"));
        assert_eq!(snapshot.average_volume, Some(1_000_000.0));
    }

    #[test]
    fn test_short_history_leaves_long_windows_empty() {
        let snapshot = FinancialSnapshot::from_quotes("ACME", &quotes(&[10.0, 11.0, 12.0])).unwrap();
        assert_eq!(snapshot.current_price, Some(12.0));
        assert!(snapshot.rsi_14.is_none());
        assert!(snapshot.sma_50.is_none());

        let metrics = snapshot.metrics();
        assert_eq!(metrics["current_price"], "$12.00");
        assert!(!metrics.contains_key("sma_200"));
    }

    #[test]
    fn test_no_data() {
        assert!(matches!(
            FinancialSnapshot::from_quotes("ACME", &[]),
            Err(MarketError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = FinancialSnapshot::empty("ACME");
        assert!(snapshot.is_empty());
        assert!(snapshot.metrics().is_empty());
        assert!(
            snapshot
                .display_metrics()
                .iter()
                .all(|(_, value)| value == "N/A")
        );
        assert_eq!(snapshot.display_metrics().len(), 25);
    }

    #[test]
    fn test_fundamentals_fill_grid() {
        let snapshot = FinancialSnapshot::from_quotes("ACME", &quotes(&[10.0, 11.0, 12.0]))
            .unwrap()
            .with_fundamentals(Fundamentals {
                market_cap: Some(2.95e12),
                pe_ratio: Some(31.5),
                sector: Some("TECHNOLOGY".to_string()),
                ..Default::default()
            });
        assert_eq!(snapshot.market_cap, Some(2.95e12));

        let grid: BTreeMap<_, _> = snapshot.display_metrics().into_iter().collect();
        assert_eq!(grid["Market Cap"], format_currency(Some(2.95e12)));
        assert_eq!(grid["P/E"], format_ratio(Some(31.5)));
        assert_eq!(grid["Current Price"], "$12.00");
        assert_eq!(grid["PEG"], "N/A");

        let metrics = snapshot.metrics();
        assert_eq!(metrics["sector"], "TECHNOLOGY");
        assert!(metrics.contains_key("market_cap"));
        assert!(!metrics.contains_key("peg_ratio"));
    }
}
