//! Concrete reasoning backend implementations
//!
//! This module contains implementations of the LLMProvider trait for
//! the HTTP services the analysis stage can talk to.

#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};
#[cfg(feature = "openai")]
pub use openai::{OpenAIConfig, OpenAIProvider};

/// Join a base URL and an endpoint path without doubling slashes
pub(crate) fn endpoint(base: &str, path: &str) -> crate::Result<url::Url> {
    let mut base = base.trim_end_matches('/').to_string();
    base.push('/');
    let base = url::Url::parse(&base)
        .map_err(|e| crate::LLMError::ConfigurationError(format!("Invalid base URL '{base}': {e}")))?;
    base.join(path.trim_start_matches('/'))
        .map_err(|e| crate::LLMError::ConfigurationError(format!("Invalid endpoint '{path}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_paths() {
        let url = endpoint("http://localhost:11434", "api/chat").unwrap();
        assert_eq!(url.as_str(), "http://localhost:11434/api/chat");

        let url = endpoint("http://localhost:1234/v1/", "/chat/completions").unwrap();
        assert_eq!(url.as_str(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn test_endpoint_rejects_garbage() {
        assert!(endpoint("not a url", "api/chat").is_err());
    }
}
