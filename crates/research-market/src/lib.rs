//! Market data for research-rs
//!
//! Daily history from Yahoo Finance is reduced to a [`FinancialSnapshot`] of
//! price statistics and technical indicators, which the analysts render into
//! their prompts and the report renders into its metrics grid.
//!
//! Sources implement [`MarketDataSource`]; [`CachedMarketData`] puts a TTL
//! cache in front of any of them. With an Alpha Vantage key configured,
//! [`EnrichedMarketData`] adds company [`Fundamentals`] to each snapshot.

pub mod cache;
pub mod error;
pub mod format;
pub mod fundamentals;
pub mod indicators;
pub mod snapshot;
pub mod source;
pub mod yahoo;

pub use cache::SnapshotCache;
pub use error::{MarketError, Result};
pub use format::{format_currency, format_percentage, format_price, format_ratio};
pub use fundamentals::{AlphaVantageClient, Fundamentals, FundamentalsSource};
pub use snapshot::FinancialSnapshot;
pub use source::{CachedMarketData, EnrichedMarketData, MarketDataSource, YahooMarketData};
pub use yahoo::{Quote, YahooFinanceClient};

#[cfg(any(test, feature = "mock"))]
pub use fundamentals::MockFundamentalsSource;
#[cfg(any(test, feature = "mock"))]
pub use source::MockMarketDataSource;
