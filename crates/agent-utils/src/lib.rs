//! Shared utilities for stock-report-rs
//!
//! This crate provides common functionality used across the workspace:
//! tracing setup and `.env` loading for the process-wide configuration.

pub mod env;
pub mod logging;

pub use env::load_dotenv;
pub use logging::{init_tracing, init_tracing_with};
