//! Pipeline controller
//!
//! Owns the fetch and analyse agents, sequences them into executions and
//! keeps the execution history for the lifetime of the process.

use super::result::{ExecutionOutcome, ExecutionRecord, StageName, StageResult, Stages};
use crate::agents::{AnalyseAgent, AnalyseStage, FetchAgent, FetchStage};
use crate::config::{AppConfig, ConfigSummary};
use crate::error::{ControllerError, Result};
use agent_core::{Agent, AgentHealth};
use async_trait::async_trait;
use chrono::Local;
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    CleanedUp,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized"),
            Self::CleanedUp => write!(f, "cleaned up"),
        }
    }
}

/// The two stage agents, built together at initialization
pub struct Pipeline {
    pub fetch: Box<dyn FetchStage>,
    pub analyse: Box<dyn AnalyseStage>,
}

/// Builds the stage agents when the controller initializes
#[async_trait]
pub trait AgentFactory: Send + Sync {
    /// Build both agents, or fail without keeping either
    async fn build(&self, config: Arc<AppConfig>) -> Result<Pipeline>;
}

/// Factory producing [`FetchAgent`] and [`AnalyseAgent`] from configuration
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAgentFactory;

#[async_trait]
impl AgentFactory for DefaultAgentFactory {
    async fn build(&self, config: Arc<AppConfig>) -> Result<Pipeline> {
        let mut fetch = FetchAgent::from_config(&config).await?;
        let analyse = match AnalyseAgent::from_config(config) {
            Ok(agent) => agent,
            Err(e) => {
                if let Err(shutdown_err) = fetch.shutdown() {
                    warn!("Releasing FetchAgent after failed init: {}", shutdown_err);
                }
                return Err(e);
            }
        };

        Ok(Pipeline {
            fetch: Box::new(fetch),
            analyse: Box::new(analyse),
        })
    }
}

/// Snapshot of controller state for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemInfo {
    pub initialized: bool,
    pub state: LifecycleState,
    pub execution_count: usize,
    /// Health per stage, keyed by stage name
    pub agents: BTreeMap<String, AgentHealth>,
    pub config: ConfigSummary,
}

/// Orchestrates fetch then analyse for each execution
///
/// Mutating operations take `&mut self`, so one controller runs one
/// execution at a time. Share it behind a `tokio::sync::Mutex` if several
/// tasks need it.
pub struct StockAnalysisController {
    config: Arc<AppConfig>,
    factory: Box<dyn AgentFactory>,
    state: LifecycleState,
    pipeline: Option<Pipeline>,
    history: Vec<ExecutionRecord>,
}

impl StockAnalysisController {
    /// Create a controller using the default agents
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self::with_factory(config, DefaultAgentFactory)
    }

    /// Create a controller with a custom agent factory
    pub fn with_factory(config: Arc<AppConfig>, factory: impl AgentFactory + 'static) -> Self {
        Self {
            config,
            factory: Box::new(factory),
            state: LifecycleState::Uninitialized,
            pipeline: None,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    /// Build both agents
    ///
    /// A no-op when already initialized. Fails after cleanup, or when an
    /// agent cannot be built (the controller then stays uninitialized).
    pub async fn initialize(&mut self) -> std::result::Result<(), ControllerError> {
        match self.state {
            LifecycleState::Initialized => return Ok(()),
            LifecycleState::CleanedUp => {
                return Err(ControllerError::Lifecycle {
                    operation: "initialize",
                    state: self.state,
                });
            }
            LifecycleState::Uninitialized => {}
        }

        info!("Initializing stock analysis controller");
        match self.factory.build(Arc::clone(&self.config)).await {
            Ok(pipeline) => {
                info!(
                    "Controller ready ({} -> {})",
                    pipeline.fetch.name(),
                    pipeline.analyse.name()
                );
                self.pipeline = Some(pipeline);
                self.state = LifecycleState::Initialized;
                Ok(())
            }
            Err(e) => {
                error!("Controller initialization failed: {}", e);
                Err(ControllerError::Initialization(e))
            }
        }
    }

    /// Run one execution for `symbols`
    ///
    /// Misuse (wrong state, bad input) is returned as `Err` and leaves the
    /// history untouched. Everything else, including stage failures, yields
    /// an [`ExecutionRecord`] that is also appended to the history.
    pub async fn execute_analysis(
        &mut self,
        symbols: &[String],
    ) -> std::result::Result<ExecutionRecord, ControllerError> {
        if self.state != LifecycleState::Initialized {
            return Err(ControllerError::Lifecycle {
                operation: "execute analysis",
                state: self.state,
            });
        }
        validate_symbols(symbols)?;

        let start_time = Local::now();
        let execution_id = self.next_execution_id(&start_time.format("%Y%m%d_%H%M%S").to_string());

        let Some(pipeline) = self.pipeline.as_ref() else {
            return Err(ControllerError::Lifecycle {
                operation: "execute analysis",
                state: self.state,
            });
        };

        info!(
            "Execution {} started for {}",
            execution_id,
            symbols.join(", ")
        );

        let fetch = guarded(StageName::Fetch, move || pipeline.fetch.execute(symbols)).await;

        let (analyse, outcome) = match &fetch {
            StageResult::Error { error, .. } => (
                None,
                ExecutionOutcome::Error {
                    error: error.clone(),
                },
            ),
            StageResult::Success { data, .. } => {
                let analyse = guarded(StageName::Analyse, move || {
                    pipeline.analyse.execute(&data.formatted, symbols)
                })
                .await;
                let outcome = match &analyse {
                    StageResult::Success { data, .. } => ExecutionOutcome::Success {
                        report_path: data.report_path.clone(),
                    },
                    StageResult::Error { error, .. } => ExecutionOutcome::Error {
                        error: error.clone(),
                    },
                };
                (Some(analyse), outcome)
            }
        };

        let end_time = Local::now().max(start_time);
        let record = ExecutionRecord {
            execution_id,
            symbols: symbols.to_vec(),
            stages: Stages { fetch, analyse },
            outcome,
            start_time,
            end_time,
        };

        log_summary(&record, self.history.len() + 1);
        self.history.push(record.clone());
        Ok(record)
    }

    /// Run one execution for the configured symbol list
    pub async fn execute_configured_analysis(
        &mut self,
    ) -> std::result::Result<ExecutionRecord, ControllerError> {
        let symbols = self.config.symbols.clone();
        self.execute_analysis(&symbols).await
    }

    /// All executions so far, oldest first
    pub fn execution_history(&self) -> &[ExecutionRecord] {
        &self.history
    }

    /// Most recent execution
    pub fn last_execution(&self) -> Option<&ExecutionRecord> {
        self.history.last()
    }

    pub fn system_info(&self) -> SystemInfo {
        let mut agents = BTreeMap::new();
        match &self.pipeline {
            Some(pipeline) => {
                agents.insert(StageName::Fetch.to_string(), pipeline.fetch.health());
                agents.insert(StageName::Analyse.to_string(), pipeline.analyse.health());
            }
            None => {
                let health = if self.state == LifecycleState::CleanedUp {
                    AgentHealth::ShutDown
                } else {
                    AgentHealth::NotInitialized
                };
                agents.insert(StageName::Fetch.to_string(), health);
                agents.insert(StageName::Analyse.to_string(), health);
            }
        }

        SystemInfo {
            initialized: self.state == LifecycleState::Initialized,
            state: self.state,
            execution_count: self.history.len(),
            agents,
            config: self.config.summary(),
        }
    }

    /// Release both agents
    ///
    /// Valid in any state and idempotent. Shutdown failures are logged, not
    /// returned.
    pub fn cleanup(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.fetch.shutdown() {
                warn!("{} shutdown failed: {}", pipeline.fetch.name(), e);
            }
            if let Err(e) = pipeline.analyse.shutdown() {
                warn!("{} shutdown failed: {}", pipeline.analyse.name(), e);
            }
        }

        if self.state != LifecycleState::CleanedUp {
            info!(
                "Controller cleaned up after {} execution(s)",
                self.history.len()
            );
            self.state = LifecycleState::CleanedUp;
        }
    }

    fn next_execution_id(&self, base: &str) -> String {
        let mut id = base.to_string();
        let mut seq = 1;
        while self.history.iter().any(|r| r.execution_id == id) {
            seq += 1;
            id = format!("{base}_{seq}");
        }
        id
    }
}

impl Drop for StockAnalysisController {
    fn drop(&mut self) {
        if self.state != LifecycleState::CleanedUp {
            self.cleanup();
        }
    }
}

fn validate_symbols(symbols: &[String]) -> std::result::Result<(), ControllerError> {
    if symbols.is_empty() {
        return Err(ControllerError::InvalidInput(
            "symbol list is empty".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(symbols.len());
    for symbol in symbols {
        if symbol.trim().is_empty() {
            return Err(ControllerError::InvalidInput(
                "symbol list contains a blank entry".to_string(),
            ));
        }
        if !seen.insert(symbol.as_str()) {
            return Err(ControllerError::InvalidInput(format!(
                "duplicate symbol {symbol}"
            )));
        }
    }
    Ok(())
}

/// Start and await a stage, turning a panic into a stage error
///
/// Covers panics raised while the stage builds its future as well as while
/// it is polled.
async fn guarded<T, F>(stage: StageName, start: impl FnOnce() -> F) -> StageResult<T>
where
    F: Future<Output = StageResult<T>>,
{
    let outcome = match std::panic::catch_unwind(AssertUnwindSafe(start)) {
        Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
        Err(payload) => Err(payload),
    };

    match outcome {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("{} stage panicked: {}", stage, message);
            StageResult::error(format!("unexpected fault in {stage} stage: {message}"))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn log_summary(record: &ExecutionRecord, total: usize) {
    let duration_ms = record.duration().num_milliseconds();
    match &record.outcome {
        ExecutionOutcome::Success { report_path } => info!(
            execution_id = %record.execution_id,
            duration_ms,
            total_executions = total,
            "Execution succeeded, report at {}",
            report_path.display()
        ),
        ExecutionOutcome::Error { error } => warn!(
            execution_id = %record.execution_id,
            duration_ms,
            total_executions = total,
            "Execution failed: {}",
            error
        ),
    }
}
