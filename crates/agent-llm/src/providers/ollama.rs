//! Ollama provider implementation
//!
//! Talks to a local Ollama server through its native, non-streaming chat
//! endpoint. See: https://github.com/ollama/ollama/blob/main/docs/api.md
//!
//! # Example
//!
//! ```no_run
//! use agent_llm::{CompletionRequest, LLMProvider, Message};
//! use agent_llm::providers::{OllamaConfig, OllamaProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OllamaProvider::with_config(
//!         OllamaConfig::new("http://localhost:11434").with_timeout(300),
//!     )?;
//!
//!     let request = CompletionRequest::builder("deepseek-r1:8b")
//!         .add_message(Message::user("Summarise NVDA's session"))
//!         .build();
//!
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.message.content);
//!     Ok(())
//! }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, Result, Role,
    StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration for the Ollama provider
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Server base URL (default: "http://localhost:11434")
    pub base_url: String,

    /// Request timeout in seconds (default: 300, local models are slow)
    pub timeout_secs: u64,
}

impl OllamaConfig {
    /// Create a config for the given server
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_BASE_URL)
    }
}

/// Ollama provider
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
    chat_url: url::Url,
}

impl OllamaProvider {
    /// Create a provider, validating the base URL up front
    pub fn with_config(config: OllamaConfig) -> Result<Self> {
        let chat_url = super::endpoint(&config.base_url, "api/chat")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            chat_url,
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    #[instrument(skip(self, request), fields(model = %request.model, base_url = %self.config.base_url))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = OllamaChatRequest::from_request(request);
        debug!("Sending chat request to {}", self.chat_url);

        let response = self
            .client
            .post(self.chat_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::from_transport(e, self.config.timeout_secs))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                404 => LLMError::ModelNotFound(body.model),
                400 => LLMError::InvalidRequest(error_text),
                _ => LLMError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        let chat: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LLMError::UnexpectedResponse(format!("Failed to parse response: {e}")))?;

        debug!(
            "Received response - done_reason: {:?}, tokens: {:?}/{:?}",
            chat.done_reason, chat.prompt_eval_count, chat.eval_count
        );

        chat.into_response()
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

// ============================================================================
// Ollama wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
    #[serde(default)]
    eval_count: Option<usize>,
}

impl OllamaChatRequest {
    fn from_request(request: CompletionRequest) -> Self {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system {
            messages.push(OllamaMessage {
                role: Role::System.as_str().to_string(),
                content: system,
            });
        }
        messages.extend(request.messages.into_iter().map(|m| OllamaMessage {
            role: m.role.as_str().to_string(),
            content: m.content,
        }));

        Self {
            model: request.model,
            messages,
            stream: false,
            options: OllamaOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
                stop: request.stop_sequences,
            },
        }
    }
}

impl OllamaChatResponse {
    fn into_response(self) -> Result<CompletionResponse> {
        let message = self
            .message
            .ok_or_else(|| LLMError::UnexpectedResponse("No message in response".to_string()))?;

        let usage = match (self.prompt_eval_count, self.eval_count) {
            (Some(input_tokens), Some(output_tokens)) => Some(TokenUsage {
                input_tokens,
                output_tokens,
            }),
            _ => None,
        };

        Ok(CompletionResponse {
            message: Message::assistant(message.content),
            stop_reason: StopReason::from_finish_reason(self.done_reason.as_deref()),
            usage,
        })
    }
}
