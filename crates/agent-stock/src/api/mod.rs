//! Market data providers
//!
//! The fetch stage talks to a [`MarketDataProvider`]; which one is built is
//! decided by configuration. Yahoo Finance needs no credentials and is always
//! available. Longbridge requires the `longbridge` feature.

#[cfg(feature = "longbridge")]
pub mod longbridge;
pub mod yahoo;

#[cfg(feature = "longbridge")]
pub use longbridge::LongbridgeProvider;
pub use yahoo::YahooProvider;

use crate::config::{AppConfig, DataProvider};
use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw quote as returned by a provider
///
/// Price fields are `0.0` when the provider has no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderQuote {
    /// Symbol exactly as requested by the caller
    pub symbol: String,
    pub last_done: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub prev_close: f64,
    pub volume: u64,
    pub turnover: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Reference data for a symbol
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StaticInfo {
    pub name_cn: Option<String>,
    pub name_en: Option<String>,
}

/// Source of quotes and reference data
///
/// `quotes` returns data for the symbols the provider knows about; unknown
/// symbols are simply absent from the result. Transport failures are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch the latest quote for each symbol
    async fn quotes(&self, symbols: &[String]) -> Result<Vec<ProviderQuote>>;

    /// Fetch reference data for one symbol, `None` when unsupported
    async fn static_info(&self, symbol: &str) -> Result<Option<StaticInfo>>;

    /// Provider name, for logs
    fn name(&self) -> &'static str;

    /// Release the provider session
    fn close(&self) -> Result<()>;
}

/// Build the provider selected by configuration
pub async fn build_provider(config: &AppConfig) -> Result<Box<dyn MarketDataProvider>> {
    match config.provider {
        DataProvider::Yahoo => Ok(Box::new(YahooProvider::new(config.request_timeout)?)),
        DataProvider::Longbridge => build_longbridge(config).await,
    }
}

#[cfg(feature = "longbridge")]
async fn build_longbridge(config: &AppConfig) -> Result<Box<dyn MarketDataProvider>> {
    let credentials = config.credentials.as_ref().ok_or_else(|| {
        StockError::ConfigError("Longbridge credentials are not configured".to_string())
    })?;
    let provider = LongbridgeProvider::connect(credentials, config.request_timeout).await?;
    Ok(Box::new(provider))
}

#[cfg(not(feature = "longbridge"))]
async fn build_longbridge(_config: &AppConfig) -> Result<Box<dyn MarketDataProvider>> {
    Err(StockError::ConfigError(
        "Longbridge provider requested but this build lacks the `longbridge` feature".to_string(),
    ))
}
