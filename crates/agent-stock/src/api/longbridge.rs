//! Longbridge OpenAPI market data provider

use super::{MarketDataProvider, ProviderQuote, StaticInfo};
use crate::config::LongbridgeCredentials;
use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::DateTime;
use longport::Config;
use longport::quote::QuoteContext;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Longbridge provider backed by an authenticated quote session
pub struct LongbridgeProvider {
    ctx: Mutex<Option<QuoteContext>>,
    timeout: Duration,
}

impl LongbridgeProvider {
    /// Open a quote session with the given credentials
    pub async fn connect(credentials: &LongbridgeCredentials, timeout: Duration) -> Result<Self> {
        let config = Arc::new(Config::new(
            credentials.app_key.clone(),
            credentials.app_secret.clone(),
            credentials.access_token.clone(),
        ));

        let (ctx, _push_events) = with_timeout("Longbridge connect", timeout, async {
            QuoteContext::try_new(config)
                .await
                .map_err(|e| StockError::MarketData(format!("Longbridge connect failed: {e}")))
        })
        .await?;

        info!("Connected to Longbridge OpenAPI");
        Ok(Self {
            ctx: Mutex::new(Some(ctx)),
            timeout,
        })
    }

    fn context(&self) -> Result<QuoteContext> {
        let guard = self
            .ctx
            .lock()
            .map_err(|_| StockError::MarketData("quote session lock poisoned".to_string()))?;
        guard
            .clone()
            .ok_or_else(|| StockError::MarketData("quote session already closed".to_string()))
    }
}

#[async_trait]
impl MarketDataProvider for LongbridgeProvider {
    #[instrument(skip(self), fields(provider = "longbridge"))]
    async fn quotes(&self, symbols: &[String]) -> Result<Vec<ProviderQuote>> {
        let ctx = self.context()?;
        let quotes = with_timeout("quote request", self.timeout, async {
            ctx.quote(symbols.to_vec())
                .await
                .map_err(|e| StockError::MarketData(e.to_string()))
        })
        .await?;

        debug!("Longbridge returned {} of {} quotes", quotes.len(), symbols.len());

        Ok(quotes
            .into_iter()
            .map(|q| ProviderQuote {
                symbol: q.symbol,
                last_done: to_f64(q.last_done),
                open: to_f64(q.open),
                high: to_f64(q.high),
                low: to_f64(q.low),
                prev_close: to_f64(q.prev_close),
                volume: u64::try_from(q.volume).unwrap_or_default(),
                turnover: q.turnover.to_f64(),
                timestamp: DateTime::from_timestamp(q.timestamp.unix_timestamp(), 0),
            })
            .collect())
    }

    async fn static_info(&self, symbol: &str) -> Result<Option<StaticInfo>> {
        let ctx = self.context()?;
        let infos = with_timeout("static info request", self.timeout, async {
            ctx.static_info([symbol.to_string()])
                .await
                .map_err(|e| StockError::MarketData(e.to_string()))
        })
        .await?;

        Ok(infos.into_iter().next().map(|info| StaticInfo {
            name_cn: non_empty(info.name_cn),
            name_en: non_empty(info.name_en),
        }))
    }

    fn name(&self) -> &'static str {
        "longbridge"
    }

    fn close(&self) -> Result<()> {
        let mut guard = self
            .ctx
            .lock()
            .map_err(|_| StockError::MarketData("quote session lock poisoned".to_string()))?;
        if guard.take().is_some() {
            info!("Longbridge quote session closed");
        }
        Ok(())
    }
}

async fn with_timeout<T, F>(operation: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| StockError::Timeout {
            operation: operation.to_string(),
            secs: timeout.as_secs(),
        })?
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}
