//! Stock report pipeline
//!
//! This crate turns a list of ticker symbols into a Markdown analysis report
//! through a two-stage pipeline:
//!
//! - Fetch: quotes and reference data from a market data provider
//!   (Yahoo Finance, or Longbridge with the `longbridge` feature)
//! - Analyse: a reasoning backend (Ollama or any OpenAI-compatible server)
//!   scores the stocks against a strategy definition, and the result is
//!   written to the output directory together with a report index
//!
//! # Architecture
//!
//! `StockAnalysisController` owns both stage agents and runs them in order.
//! Each call to `execute_analysis` yields one `ExecutionRecord` with a
//! per-stage `StageResult`, whichever stage fails. Stage failures never
//! surface as `Err`; only misuse of the controller does.
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_stock::{AppConfig, ControllerSession, StockAnalysisController};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(AppConfig::from_env()?);
//!     let mut controller = StockAnalysisController::new(config);
//!     let mut session = ControllerSession::acquire(&mut controller).await?;
//!
//!     let record = session
//!         .execute_analysis(&["NVDA.US".to_string(), "AAPL.US".to_string()])
//!         .await?;
//!     match record.report_path() {
//!         Some(path) => println!("Report: {}", path.display()),
//!         None => println!("Failed: {}", record.error().unwrap_or_default()),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod prompts;
pub mod report;

// Re-export main types for convenience
pub use agents::{AnalyseAgent, AnalyseStage, FetchAgent, FetchStage};
pub use api::{MarketDataProvider, ProviderQuote, StaticInfo, YahooProvider};
pub use config::{AppConfig, ConfigSummary, DataProvider, FetchPolicy, LlmBackend};
pub use engine::{
    AgentFactory, AnalysisReport, ControllerSession, DefaultAgentFactory, ExecutionOutcome,
    ExecutionRecord, FetchReport, LifecycleState, Pipeline, StageName, StageResult, Stages,
    StockAnalysisController, StockSnapshot, SystemInfo,
};
pub use error::{ControllerError, Result, StockError};
