//! Stock analysis engine
//!
//! Controller, scoped session and the result shapes shared by both stages

pub mod controller;
pub mod result;
pub mod session;

pub use controller::{
    AgentFactory, DefaultAgentFactory, LifecycleState, Pipeline, StockAnalysisController,
    SystemInfo,
};
pub use result::{
    AnalysisReport, ExecutionOutcome, ExecutionRecord, FetchReport, StageName, StageResult,
    Stages, StockSnapshot,
};
pub use session::ControllerSession;
