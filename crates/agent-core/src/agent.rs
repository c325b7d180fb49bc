//! Core Agent trait definition

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health of a component as seen by its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentHealth {
    /// Constructed and able to serve requests
    Ready,
    /// Never constructed (owner not initialized yet)
    NotInitialized,
    /// Shut down by its owner; must not be used again
    ShutDown,
}

impl fmt::Display for AgentHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::NotInitialized => write!(f, "not_initialized"),
            Self::ShutDown => write!(f, "shut_down"),
        }
    }
}

/// Lifecycle contract implemented by every pipeline component
///
/// Stage-specific work lives on the stage traits built on top of this one;
/// `Agent` only covers what an owner needs to manage the component.
///
/// `shutdown` is synchronous so owners can release components from `Drop`.
pub trait Agent: Send + Sync {
    /// Get the agent's name
    fn name(&self) -> &str;

    /// Report the agent's health (optional)
    fn health(&self) -> AgentHealth {
        AgentHealth::Ready
    }

    /// Release external resources held by the agent (optional)
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    impl Agent for Bare {
        fn name(&self) -> &str {
            "bare"
        }
    }

    #[test]
    fn test_default_lifecycle() {
        let mut bare = Bare;
        assert_eq!(bare.health(), AgentHealth::Ready);
        assert!(bare.shutdown().is_ok());
    }

    #[test]
    fn test_health_serialization() {
        let json = serde_json::to_string(&AgentHealth::NotInitialized).unwrap();
        assert_eq!(json, "\"not_initialized\"");
        assert_eq!(AgentHealth::ShutDown.to_string(), "shut_down");
    }
}
