//! Market data fetch stage

use super::FetchStage;
use crate::api::{MarketDataProvider, ProviderQuote, build_provider};
use crate::config::{AppConfig, FetchPolicy};
use crate::engine::{FetchReport, StageResult, StockSnapshot};
use crate::error::{Result, StockError};
use agent_core::{Agent, AgentHealth};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use tracing::{info, warn};

/// Names shown in place of tickers that are commonly analysed
const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("BABA.US", "阿里巴巴"),
    ("NVDA.US", "英伟达"),
    ("TSLA.US", "特斯拉"),
    ("AAPL.US", "苹果"),
    ("GOOGL.US", "谷歌"),
    ("MSFT.US", "微软"),
    ("AMZN.US", "亚马逊"),
    ("META.US", "Meta"),
    ("00700.HK", "腾讯控股"),
    ("09988.HK", "阿里巴巴-SW"),
];

/// Well-known display name for a symbol
pub fn display_name(symbol: &str) -> Option<&'static str> {
    DISPLAY_NAMES
        .iter()
        .find(|(s, _)| s.eq_ignore_ascii_case(symbol))
        .map(|(_, name)| *name)
}

/// Agent that retrieves quotes and turns them into an analysis payload
pub struct FetchAgent {
    provider: Box<dyn MarketDataProvider>,
    policy: FetchPolicy,
    health: AgentHealth,
}

impl FetchAgent {
    /// Create a fetch agent over an existing provider
    pub fn new(provider: Box<dyn MarketDataProvider>, policy: FetchPolicy) -> Self {
        Self {
            provider,
            policy,
            health: AgentHealth::Ready,
        }
    }

    /// Create a fetch agent with the provider selected by configuration
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let provider = build_provider(config).await?;
        info!("FetchAgent ready (provider: {})", provider.name());
        Ok(Self::new(provider, config.fetch_policy))
    }

    /// Format snapshots as the Markdown payload consumed by the analyse stage
    pub fn format_for_analysis(snapshots: &[StockSnapshot], fetched_at: DateTime<Local>) -> String {
        format_for_analysis(snapshots, fetched_at)
    }

    async fn fetch(&self, symbols: &[String]) -> Result<FetchReport> {
        let quotes = self.provider.quotes(symbols).await?;

        let mut by_symbol: HashMap<String, ProviderQuote> = quotes
            .into_iter()
            .map(|q| (q.symbol.clone(), q))
            .collect();

        let mut snapshots = Vec::with_capacity(symbols.len());
        let mut missing = Vec::new();
        for symbol in symbols {
            match by_symbol.remove(symbol) {
                Some(quote) => snapshots.push(self.snapshot(quote).await),
                None => missing.push(symbol.clone()),
            }
        }

        if snapshots.is_empty() {
            return Err(StockError::DataUnavailable {
                symbols: symbols.join(", "),
                reason: "provider returned no quotes".to_string(),
            });
        }

        if !missing.is_empty() {
            match self.policy {
                FetchPolicy::Strict => {
                    return Err(StockError::DataUnavailable {
                        symbols: missing.join(", "),
                        reason: "no quote returned".to_string(),
                    });
                }
                FetchPolicy::Degrade => {
                    warn!("No quote for {}; continuing without them", missing.join(", "));
                }
            }
        }

        let fetched_at = Local::now();
        let mut formatted = format_for_analysis(&snapshots, fetched_at);
        if !missing.is_empty() {
            formatted.push_str(&format!(
                "> Data unavailable for: {}. These symbols are omitted from the analysis.\n",
                missing.join(", ")
            ));
        }

        Ok(FetchReport {
            retrieved: snapshots.iter().map(|s| s.symbol.clone()).collect(),
            snapshots,
            missing,
            fetched_at,
            formatted,
        })
    }

    async fn snapshot(&self, quote: ProviderQuote) -> StockSnapshot {
        let info = match self.provider.static_info(&quote.symbol).await {
            Ok(info) => info.unwrap_or_default(),
            Err(e) => {
                warn!("Static info for {} unavailable: {}", quote.symbol, e);
                Default::default()
            }
        };

        let display = display_name(&quote.symbol)
            .map(ToString::to_string)
            .or_else(|| info.name_cn.clone())
            .or_else(|| info.name_en.clone())
            .unwrap_or_else(|| quote.symbol.clone());

        let snapshot = StockSnapshot {
            display_name: display,
            name_en: info.name_en,
            name_cn: info.name_cn,
            change_pct: change_pct(quote.last_done, quote.prev_close),
            last_done: quote.last_done,
            open: quote.open,
            high: quote.high,
            low: quote.low,
            prev_close: quote.prev_close,
            volume: quote.volume,
            turnover: quote.turnover,
            quoted_at: quote
                .timestamp
                .map_or_else(Local::now, |t| t.with_timezone(&Local)),
            symbol: quote.symbol,
        };

        info!(
            "{}: ${:.2} ({:+.2}%)",
            snapshot.symbol, snapshot.last_done, snapshot.change_pct
        );
        snapshot
    }
}

impl Agent for FetchAgent {
    fn name(&self) -> &str {
        "FetchAgent"
    }

    fn health(&self) -> AgentHealth {
        self.health
    }

    fn shutdown(&mut self) -> agent_core::Result<()> {
        if self.health == AgentHealth::ShutDown {
            return Ok(());
        }
        self.health = AgentHealth::ShutDown;
        self.provider
            .close()
            .map_err(|e| agent_core::Error::ShutdownFailed(e.to_string()))
    }
}

#[async_trait]
impl FetchStage for FetchAgent {
    async fn execute(&self, symbols: &[String]) -> StageResult<FetchReport> {
        if self.health == AgentHealth::ShutDown {
            return StageResult::error("FetchAgent has been shut down");
        }

        info!("Fetching data for {} symbol(s)", symbols.len());
        match self.fetch(symbols).await {
            Ok(report) => {
                info!("Fetched {} of {} symbol(s)", report.retrieved.len(), symbols.len());
                StageResult::success(report)
            }
            Err(e) => {
                warn!("Fetch failed: {}", e);
                StageResult::error(format!("Data fetch failed: {e}"))
            }
        }
    }
}

/// Percent change rounded to 2 dp, `0` when either price is missing
pub(crate) fn change_pct(last_done: f64, prev_close: f64) -> f64 {
    if last_done == 0.0 || prev_close == 0.0 {
        return 0.0;
    }
    ((last_done - prev_close) / prev_close * 100.0 * 100.0).round() / 100.0
}

/// Render snapshots as the Markdown payload for the analyse stage
pub fn format_for_analysis(snapshots: &[StockSnapshot], fetched_at: DateTime<Local>) -> String {
    let mut text = String::from("# Real-time Market Data\n\n");
    text.push_str(&format!(
        "**Fetched at**: {}\n\n---\n\n",
        fetched_at.format("%Y-%m-%d %H:%M:%S")
    ));

    for s in snapshots {
        text.push_str(&format!("## {} ({})\n\n", s.display_name, s.symbol));

        text.push_str("### Price\n\n");
        text.push_str(&format!("- **Last**: ${:.2}\n", s.last_done));
        text.push_str(&format!("- **Change**: {:+.2}%\n", s.change_pct));
        text.push_str(&format!("- **Open**: ${:.2}\n", s.open));
        text.push_str(&format!("- **High**: ${:.2}\n", s.high));
        text.push_str(&format!("- **Low**: ${:.2}\n", s.low));
        text.push_str(&format!("- **Previous close**: ${:.2}\n\n", s.prev_close));

        text.push_str("### Trading\n\n");
        text.push_str(&format!("- **Volume**: {}\n", group_thousands(s.volume)));
        match s.turnover {
            Some(turnover) => text.push_str(&format!("- **Turnover**: ${}\n\n", money(turnover))),
            None => text.push_str("- **Turnover**: n/a\n\n"),
        }

        text.push_str("---\n\n");
    }

    text
}

/// `1234567` -> `1,234,567`
pub(crate) fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Two decimal places with grouped thousands
pub(crate) fn money(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{}.{:02}", group_thousands(cents / 100), cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockMarketDataProvider, StaticInfo};

    fn quote(symbol: &str, last: f64, prev: f64) -> ProviderQuote {
        ProviderQuote {
            symbol: symbol.to_string(),
            last_done: last,
            open: prev,
            high: last.max(prev),
            low: last.min(prev),
            prev_close: prev,
            volume: 45_234_567,
            turnover: Some(1_234_567.891),
            timestamp: None,
        }
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn provider_with(quotes: Vec<ProviderQuote>) -> MockMarketDataProvider {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_quotes()
            .returning(move |_| Ok(quotes.clone()));
        provider.expect_static_info().returning(|_| Ok(None));
        provider
    }

    #[test]
    fn test_change_pct() {
        assert_eq!(change_pct(102.35, 100.0), 2.35);
        assert_eq!(change_pct(95.0, 100.0), -5.0);
        assert_eq!(change_pct(100.0, 0.0), 0.0);
        assert_eq!(change_pct(0.0, 100.0), 0.0);
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(45_234_567), "45,234,567");
        assert_eq!(money(1_234_567.891), "1,234,567.89");
        assert_eq!(money(0.5), "0.50");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("NVDA.US"), Some("英伟达"));
        assert_eq!(display_name("00700.HK"), Some("腾讯控股"));
        assert_eq!(display_name("ZZZZ.INVALID"), None);
    }

    #[tokio::test]
    async fn test_fetch_success_preserves_order() {
        let provider = provider_with(vec![
            quote("AAPL.US", 190.0, 200.0),
            quote("NVDA.US", 102.35, 100.0),
        ]);
        let agent = FetchAgent::new(Box::new(provider), FetchPolicy::Strict);

        let result = agent.execute(&symbols(&["NVDA.US", "AAPL.US"])).await;
        let report = result.data().unwrap();

        assert_eq!(report.retrieved, vec!["NVDA.US", "AAPL.US"]);
        assert!(report.missing.is_empty());
        assert_eq!(report.snapshots[0].display_name, "英伟达");
        assert_eq!(report.snapshots[0].change_pct, 2.35);
        assert!(report.formatted.contains("## 英伟达 (NVDA.US)"));
        assert!(report.formatted.contains("- **Change**: +2.35%"));
        assert!(report.formatted.contains("- **Volume**: 45,234,567"));
        assert!(
            report.formatted.find("NVDA.US").unwrap() < report.formatted.find("AAPL.US").unwrap()
        );
    }

    #[tokio::test]
    async fn test_strict_policy_fails_on_missing_symbol() {
        let provider = provider_with(vec![quote("NVDA.US", 102.35, 100.0)]);
        let agent = FetchAgent::new(Box::new(provider), FetchPolicy::Strict);

        let result = agent.execute(&symbols(&["NVDA.US", "ZZZZ.INVALID"])).await;

        let error = result.error_message().unwrap();
        assert!(error.contains("ZZZZ.INVALID"));
        assert!(!error.contains("NVDA.US"));
    }

    #[tokio::test]
    async fn test_degrade_policy_reports_missing_symbol() {
        let provider = provider_with(vec![quote("NVDA.US", 102.35, 100.0)]);
        let agent = FetchAgent::new(Box::new(provider), FetchPolicy::Degrade);

        let result = agent.execute(&symbols(&["NVDA.US", "ZZZZ.INVALID"])).await;
        let report = result.data().unwrap();

        assert_eq!(report.retrieved, vec!["NVDA.US"]);
        assert_eq!(report.missing, vec!["ZZZZ.INVALID"]);
        assert!(report.formatted.contains("Data unavailable for: ZZZZ.INVALID"));
    }

    #[tokio::test]
    async fn test_nothing_retrieved_is_an_error_under_any_policy() {
        let agent = FetchAgent::new(Box::new(provider_with(Vec::new())), FetchPolicy::Degrade);
        let result = agent.execute(&symbols(&["ZZZZ.INVALID"])).await;
        assert!(result.error_message().unwrap().contains("no quotes"));
    }

    #[tokio::test]
    async fn test_provider_error_becomes_stage_error() {
        let mut provider = MockMarketDataProvider::new();
        provider.expect_quotes().returning(|_| {
            Err(StockError::Timeout {
                operation: "quote request".to_string(),
                secs: 30,
            })
        });
        let agent = FetchAgent::new(Box::new(provider), FetchPolicy::Strict);

        let result = agent.execute(&symbols(&["NVDA.US"])).await;
        assert!(result.error_message().unwrap().contains("timed out after 30s"));
    }

    #[tokio::test]
    async fn test_static_info_failure_only_degrades_names() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_quotes()
            .returning(|_| Ok(vec![quote("SHOP.US", 80.0, 80.0)]));
        provider
            .expect_static_info()
            .returning(|_| Err(StockError::MarketData("rate limited".to_string())));
        let agent = FetchAgent::new(Box::new(provider), FetchPolicy::Strict);

        let result = agent.execute(&symbols(&["SHOP.US"])).await;
        let snapshot = &result.data().unwrap().snapshots[0];
        assert_eq!(snapshot.display_name, "SHOP.US");
        assert_eq!(snapshot.change_pct, 0.0);
    }

    #[tokio::test]
    async fn test_static_info_names_are_used() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_quotes()
            .returning(|_| Ok(vec![quote("SHOP.US", 80.0, 80.0)]));
        provider.expect_static_info().returning(|_| {
            Ok(Some(StaticInfo {
                name_cn: None,
                name_en: Some("Shopify Inc.".to_string()),
            }))
        });
        let agent = FetchAgent::new(Box::new(provider), FetchPolicy::Strict);

        let result = agent.execute(&symbols(&["SHOP.US"])).await;
        assert_eq!(result.data().unwrap().snapshots[0].display_name, "Shopify Inc.");
    }

    #[tokio::test]
    async fn test_shutdown_closes_provider_once() {
        let mut provider = MockMarketDataProvider::new();
        provider.expect_close().times(1).returning(|| Ok(()));
        let mut agent = FetchAgent::new(Box::new(provider), FetchPolicy::Strict);

        assert_eq!(agent.health(), AgentHealth::Ready);
        agent.shutdown().unwrap();
        agent.shutdown().unwrap();
        assert_eq!(agent.health(), AgentHealth::ShutDown);

        let result = agent.execute(&symbols(&["NVDA.US"])).await;
        assert!(!result.is_success());
    }
}
