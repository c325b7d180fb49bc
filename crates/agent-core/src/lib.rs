//! Core abstractions for stock-report-rs
//!
//! This crate defines the lifecycle contract shared by every pipeline
//! component: a name for logs and system snapshots, a health report, and an
//! explicit shutdown hook the owner calls when it releases the component.

pub mod agent;
pub mod error;

pub use agent::{Agent, AgentHealth};
pub use error::{Error, Result};
