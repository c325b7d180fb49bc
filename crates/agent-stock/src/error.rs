//! Error types for the stock report pipeline
//!
//! Two families live here:
//! - [`StockError`] is what components, providers and configuration fail
//!   with internally. It never leaves the controller as a fault: stage
//!   failures are folded into a `StageResult` as a diagnostic string.
//! - [`ControllerError`] covers misuse of the controller (wrong lifecycle
//!   state, malformed input) and is returned to the caller directly.

use crate::engine::LifecycleState;
use thiserror::Error;

/// Stock pipeline component errors
#[derive(Debug, Error)]
pub enum StockError {
    /// Market data provider failed
    #[error("Market data error: {0}")]
    MarketData(String),

    /// Data not available for the requested symbols
    #[error("Data not available for {symbols}: {reason}")]
    DataUnavailable { symbols: String, reason: String },

    /// Reasoning backend failed
    #[error("Reasoning backend error: {0}")]
    Llm(#[from] agent_llm::LLMError),

    /// Reasoning backend answered with something unusable
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    /// An external call exceeded its deadline
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// Filesystem error while reading the strategy or writing reports
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Prompt or report template failed to render
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StockError {
    /// Attach a path to an I/O error
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

/// Errors the controller raises to its caller
///
/// Only misuse ends up here; pipeline failures are reported in-band on the
/// returned `ExecutionRecord`.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Operation invoked outside the valid lifecycle window
    #[error("Cannot {operation} while controller is {state}")]
    Lifecycle {
        operation: &'static str,
        state: LifecycleState,
    },

    /// Components could not be constructed during `initialize`
    #[error("Controller initialization failed: {0}")]
    Initialization(#[source] StockError),

    /// Malformed caller input, rejected before any stage runs
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ControllerError {
    /// Whether this is a lifecycle-class error (wrong state or failed init)
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Lifecycle { .. } | Self::Initialization(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StockError::DataUnavailable {
            symbols: "ZZZZ.INVALID".to_string(),
            reason: "no quote returned".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Data not available for ZZZZ.INVALID: no quote returned"
        );

        let err = StockError::Timeout {
            operation: "quote request".to_string(),
            secs: 30,
        };
        assert_eq!(err.to_string(), "quote request timed out after 30s");
    }

    #[test]
    fn test_lifecycle_display() {
        let err = ControllerError::Lifecycle {
            operation: "execute analysis",
            state: LifecycleState::Uninitialized,
        };
        assert_eq!(
            err.to_string(),
            "Cannot execute analysis while controller is uninitialized"
        );
        assert!(err.is_lifecycle());
        assert!(!ControllerError::InvalidInput("empty".to_string()).is_lifecycle());
    }
}
