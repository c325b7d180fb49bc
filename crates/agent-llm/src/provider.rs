//! LLM provider trait definition

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// Trait for reasoning backends
///
/// Implementations of this trait submit a prompt to a text-generation
/// service (e.g., Ollama, LM Studio, vLLM) and return its completion.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the backend
    ///
    /// # Arguments
    ///
    /// * `request` - The completion request with messages and sampling parameters
    ///
    /// # Returns
    ///
    /// The completion response with the assistant's message and metadata
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the provider name (e.g., "ollama", "openai")
    fn name(&self) -> &str;
}
