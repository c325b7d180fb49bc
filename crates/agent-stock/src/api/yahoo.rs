//! Yahoo Finance market data provider

use super::{MarketDataProvider, ProviderQuote, StaticInfo};
use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::DateTime;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use yahoo_finance_api as yahoo;

/// Yahoo Finance provider
///
/// Quotes come from the daily chart endpoint: the last candle is the current
/// session and the one before it supplies the previous close. Yahoo does not
/// report turnover.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
    timeout: Duration,
}

impl YahooProvider {
    /// Create a new provider with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let connector =
            yahoo::YahooConnector::new().map_err(|e| StockError::MarketData(e.to_string()))?;
        Ok(Self { connector, timeout })
    }

    async fn quote_one(&self, symbol: &str) -> Result<Option<ProviderQuote>> {
        let ticker = to_yahoo_symbol(symbol);
        let request = self.connector.get_quote_range(&ticker, "1d", "5d");

        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return unknown_or_error(symbol, &ticker, e),
            Err(_) => {
                return Err(StockError::Timeout {
                    operation: format!("quote request for {symbol}"),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let candles = match response.quotes() {
            Ok(candles) => candles,
            Err(e) => return unknown_or_error(symbol, &ticker, e),
        };

        let Some(last) = candles.last() else {
            return Ok(None);
        };
        let prev_close = candles
            .len()
            .checked_sub(2)
            .and_then(|i| candles.get(i))
            .map_or(0.0, |c| c.close);

        Ok(Some(ProviderQuote {
            symbol: symbol.to_string(),
            last_done: last.close,
            open: last.open,
            high: last.high,
            low: last.low,
            prev_close,
            volume: last.volume,
            turnover: None,
            timestamp: DateTime::from_timestamp(last.timestamp as i64, 0),
        }))
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn quotes(&self, symbols: &[String]) -> Result<Vec<ProviderQuote>> {
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if let Some(quote) = self.quote_one(symbol).await? {
                debug!("{}: {:.2}", symbol, quote.last_done);
                quotes.push(quote);
            }
        }
        Ok(quotes)
    }

    async fn static_info(&self, _symbol: &str) -> Result<Option<StaticInfo>> {
        // The chart endpoint carries no company names
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Whether Yahoo answered that the ticker has no data
///
/// Transport, session and rate-limit failures say nothing about the ticker
/// and must not be reported as a missing symbol.
fn is_unknown_symbol(err: &yahoo::YahooError) -> bool {
    use yahoo::YahooError;

    matches!(
        err,
        YahooError::NoResult
            | YahooError::NoQuotes
            | YahooError::ApiError(_)
            | YahooError::FetchFailed(_)
    )
}

fn unknown_or_error(
    symbol: &str,
    ticker: &str,
    err: yahoo::YahooError,
) -> Result<Option<ProviderQuote>> {
    if is_unknown_symbol(&err) {
        warn!("Yahoo returned no data for {} ({}): {}", symbol, ticker, err);
        Ok(None)
    } else {
        Err(StockError::MarketData(format!(
            "Yahoo request for {symbol} failed: {err}"
        )))
    }
}

/// Map a `CODE.MARKET` symbol to Yahoo's ticker convention
///
/// `NVDA.US` becomes `NVDA`, `00700.HK` becomes `0700.HK` and `600519.SH`
/// becomes `600519.SS`. Anything else is passed through.
pub fn to_yahoo_symbol(symbol: &str) -> String {
    let Some((code, market)) = symbol.rsplit_once('.') else {
        return symbol.to_string();
    };

    match market.to_ascii_uppercase().as_str() {
        "US" => code.to_string(),
        "HK" => {
            let trimmed = code.trim_start_matches('0');
            format!("{trimmed:0>4}.HK")
        }
        "SH" => format!("{code}.SS"),
        "SZ" => format!("{code}.SZ"),
        _ => symbol.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_mapping() {
        assert_eq!(to_yahoo_symbol("NVDA.US"), "NVDA");
        assert_eq!(to_yahoo_symbol("BRK.B.US"), "BRK.B");
        assert_eq!(to_yahoo_symbol("00700.HK"), "0700.HK");
        assert_eq!(to_yahoo_symbol("09988.HK"), "9988.HK");
        assert_eq!(to_yahoo_symbol("600519.SH"), "600519.SS");
        assert_eq!(to_yahoo_symbol("000001.SZ"), "000001.SZ");
        assert_eq!(to_yahoo_symbol("AAPL"), "AAPL");
    }

    #[test]
    fn test_error_classification() {
        use yahoo::YahooError;

        assert!(is_unknown_symbol(&YahooError::NoResult));
        assert!(is_unknown_symbol(&YahooError::NoQuotes));
        assert!(is_unknown_symbol(&YahooError::FetchFailed(
            "404 Not Found".to_string()
        )));

        assert!(!is_unknown_symbol(&YahooError::TooManyRequests(
            "chart".to_string()
        )));
        assert!(!is_unknown_symbol(&YahooError::Unauthorized));
        assert!(!is_unknown_symbol(&YahooError::InvalidCrumb));
        assert!(!is_unknown_symbol(&YahooError::NoResponse));
    }

    #[test]
    fn test_transport_failure_is_an_error() {
        let missing = unknown_or_error("ZZZZ.INVALID", "ZZZZ.INVALID", yahoo::YahooError::NoResult);
        assert!(matches!(missing, Ok(None)));

        let err = unknown_or_error(
            "NVDA.US",
            "NVDA",
            yahoo::YahooError::TooManyRequests("chart".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, StockError::MarketData(_)));
        assert!(err.to_string().contains("NVDA.US"));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_quotes() {
        let provider = YahooProvider::new(Duration::from_secs(30)).unwrap();
        let quotes = provider
            .quotes(&["AAPL.US".to_string(), "ZZZZ.INVALID".to_string()])
            .await
            .unwrap();

        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "AAPL.US");
        assert!(quotes[0].last_done > 0.0);
    }
}
