//! Pipeline stage agents
//!
//! Each stage is an [`Agent`] (so its owner can manage its lifecycle) with a
//! stage-specific `execute`. Stages never return `Err`: every failure is
//! reported as a [`StageResult::Error`] carrying a diagnostic string.

pub mod analyse;
pub mod fetch;

pub use analyse::{AnalyseAgent, strip_reasoning};
pub use fetch::{FetchAgent, display_name, format_for_analysis};

use crate::engine::{AnalysisReport, FetchReport, StageResult};
use agent_core::Agent;
use async_trait::async_trait;

/// Market data retrieval stage
#[async_trait]
pub trait FetchStage: Agent {
    /// Fetch data for `symbols` and format it for analysis
    async fn execute(&self, symbols: &[String]) -> StageResult<FetchReport>;
}

/// Analysis and report generation stage
#[async_trait]
pub trait AnalyseStage: Agent {
    /// Analyse the formatted payload and persist a report
    async fn execute(&self, formatted_data: &str, symbols: &[String])
    -> StageResult<AnalysisReport>;
}
