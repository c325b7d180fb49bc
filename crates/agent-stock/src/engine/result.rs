//! Stage and execution result types

use chrono::{DateTime, Local, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Pipeline stage identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Fetch,
    Analyse,
}

impl StageName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Analyse => "analyse",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single stage
///
/// Produced by the component itself; the controller never builds a success
/// value on a component's behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageResult<T> {
    Success { data: T, timestamp: DateTime<Local> },
    Error { error: String, timestamp: DateTime<Local> },
}

impl<T> StageResult<T> {
    /// Successful outcome stamped now
    pub fn success(data: T) -> Self {
        Self::Success {
            data,
            timestamp: Local::now(),
        }
    }

    /// Failed outcome stamped now
    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
            timestamp: Local::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { error, .. } => Some(error),
        }
    }

    /// When the stage completed
    pub fn timestamp(&self) -> DateTime<Local> {
        match self {
            Self::Success { timestamp, .. } | Self::Error { timestamp, .. } => *timestamp,
        }
    }
}

/// Normalized quote for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub symbol: String,
    pub display_name: String,
    pub name_en: Option<String>,
    pub name_cn: Option<String>,
    pub last_done: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub prev_close: f64,
    /// Percent change against previous close, rounded to 2 dp
    pub change_pct: f64,
    pub volume: u64,
    pub turnover: Option<f64>,
    pub quoted_at: DateTime<Local>,
}

/// Data produced by a successful fetch stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchReport {
    /// Snapshots in request order
    pub snapshots: Vec<StockSnapshot>,
    /// Symbols the provider answered for
    pub retrieved: Vec<String>,
    /// Requested symbols with no data (only non-empty in degrade mode)
    pub missing: Vec<String>,
    pub fetched_at: DateTime<Local>,
    /// Analysis-ready payload handed to the analyse stage
    pub formatted: String,
}

/// Data produced by a successful analyse stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub report_path: PathBuf,
    pub index_path: Option<PathBuf>,
    pub analysis: String,
    pub symbols: Vec<String>,
    pub model: String,
    pub generated_at: DateTime<Local>,
}

/// Per-stage results of one execution
///
/// `analyse` is only present when fetch succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stages {
    pub fetch: StageResult<FetchReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyse: Option<StageResult<AnalysisReport>>,
}

/// Overall outcome of one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success { report_path: PathBuf },
    Error { error: String },
}

/// One run of the pipeline, as kept in the controller's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub symbols: Vec<String>,
    pub stages: Stages,
    #[serde(flatten)]
    pub outcome: ExecutionOutcome,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
}

impl ExecutionRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Success { .. })
    }

    pub fn report_path(&self) -> Option<&PathBuf> {
        match &self.outcome {
            ExecutionOutcome::Success { report_path } => Some(report_path),
            ExecutionOutcome::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ExecutionOutcome::Success { .. } => None,
            ExecutionOutcome::Error { error } => Some(error),
        }
    }

    /// Wall-clock time the execution took
    pub fn duration(&self) -> TimeDelta {
        self.end_time - self.start_time
    }

    /// `"success"` or `"error"`
    pub fn status(&self) -> &'static str {
        if self.is_success() { "success" } else { "error" }
    }
}
