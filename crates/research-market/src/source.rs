//! Market data sources

use crate::cache::SnapshotCache;
use crate::error::{MarketError, Result};
use crate::fundamentals::{AlphaVantageClient, FundamentalsSource};
use crate::snapshot::FinancialSnapshot;
use crate::yahoo::YahooFinanceClient;
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use research_core::validate_ticker;
use research_utils::MarketSettings;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Something that can produce a [`FinancialSnapshot`] for a ticker
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn snapshot(&self, ticker: &str) -> Result<FinancialSnapshot>;

    fn name(&self) -> &'static str;
}

/// Snapshots computed from Yahoo Finance daily history
pub struct YahooMarketData {
    client: YahooFinanceClient,
    history_days: u32,
    rate_limiter: SharedRateLimiter,
}

impl YahooMarketData {
    pub fn new(history_days: u32, requests_per_second: u32) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            client: YahooFinanceClient::new(),
            history_days,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        }
    }

    pub fn from_settings(settings: &MarketSettings) -> Self {
        Self::new(settings.history_days, settings.requests_per_second)
    }
}

#[async_trait]
impl MarketDataSource for YahooMarketData {
    #[instrument(skip(self))]
    async fn snapshot(&self, ticker: &str) -> Result<FinancialSnapshot> {
        if !validate_ticker(ticker) {
            return Err(MarketError::InvalidSymbol(ticker.to_string()));
        }
        let symbol = ticker.trim().to_ascii_uppercase();

        self.rate_limiter.until_ready().await;
        let quotes = self.client.get_history(&symbol, self.history_days).await?;
        debug!("Computing snapshot for {} from {} bars", symbol, quotes.len());
        FinancialSnapshot::from_quotes(&symbol, &quotes)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

/// Price snapshots from one source with fundamentals from another
///
/// A fundamentals failure is logged and the price snapshot returned as is.
pub struct EnrichedMarketData {
    prices: Arc<dyn MarketDataSource>,
    fundamentals: Arc<dyn FundamentalsSource>,
}

impl EnrichedMarketData {
    pub fn new(prices: Arc<dyn MarketDataSource>, fundamentals: Arc<dyn FundamentalsSource>) -> Self {
        Self {
            prices,
            fundamentals,
        }
    }
}

#[async_trait]
impl MarketDataSource for EnrichedMarketData {
    #[instrument(skip(self))]
    async fn snapshot(&self, ticker: &str) -> Result<FinancialSnapshot> {
        let snapshot = self.prices.snapshot(ticker).await?;
        match self.fundamentals.fundamentals(&snapshot.symbol).await {
            Ok(fundamentals) => Ok(snapshot.with_fundamentals(fundamentals)),
            Err(e) => {
                warn!(
                    "{} fundamentals unavailable for {}: {}",
                    self.fundamentals.name(),
                    snapshot.symbol,
                    e
                );
                Ok(snapshot)
            }
        }
    }

    fn name(&self) -> &'static str {
        self.prices.name()
    }
}

/// TTL-caching wrapper around another source
pub struct CachedMarketData {
    inner: Arc<dyn MarketDataSource>,
    cache: SnapshotCache,
}

impl CachedMarketData {
    pub fn new(inner: Arc<dyn MarketDataSource>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: SnapshotCache::new(ttl),
        }
    }

    /// Cached Yahoo source configured from settings, enriched with
    /// Alpha Vantage fundamentals when a key is set
    pub fn from_settings(settings: &MarketSettings) -> Self {
        let prices: Arc<dyn MarketDataSource> = Arc::new(YahooMarketData::from_settings(settings));
        let key = settings
            .alpha_vantage_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty());
        let source: Arc<dyn MarketDataSource> = match key {
            Some(key) => {
                let fundamentals = AlphaVantageClient::new(key, settings.fundamentals_per_minute);
                Arc::new(EnrichedMarketData::new(prices, Arc::new(fundamentals)))
            }
            None => prices,
        };
        Self::new(source, Duration::from_secs(settings.cache_ttl_secs))
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }
}

#[async_trait]
impl MarketDataSource for CachedMarketData {
    async fn snapshot(&self, ticker: &str) -> Result<FinancialSnapshot> {
        self.cache
            .get_or_fetch(ticker, || self.inner.snapshot(ticker))
            .await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
