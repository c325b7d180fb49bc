//! Reasoning backend abstraction layer for stock-report-rs
//!
//! This crate provides provider-agnostic abstractions for talking to the
//! text-generation service that writes the analysis. It includes:
//!
//! - Message types for chat-style prompts
//! - Completion request/response types
//! - Provider trait for backend implementations
//! - Concrete providers for Ollama and OpenAI-compatible servers (behind feature flags)

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

// Provider implementations (feature-gated)
#[cfg(any(feature = "ollama", feature = "openai"))]
pub mod providers;
