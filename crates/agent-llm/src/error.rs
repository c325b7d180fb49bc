//! Error types for LLM operations

use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur while talking to a reasoning backend
#[derive(Error, Debug)]
pub enum LLMError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not found on the backend
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The backend did not answer within the configured timeout
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// Whether retrying the same request may succeed
    ///
    /// Transport failures and malformed responses are transient from the
    /// caller's point of view; authentication and request errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed(_)
                | Self::Timeout(_)
                | Self::HttpError(_)
                | Self::UnexpectedResponse(_)
        )
    }

    /// Map a transport error, keeping timeouts distinguishable
    pub(crate) fn from_transport(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout_secs)
        } else {
            Self::HttpError(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LLMError::RequestFailed("503".to_string()).is_retryable());
        assert!(LLMError::Timeout(30).is_retryable());
        assert!(LLMError::UnexpectedResponse("empty".to_string()).is_retryable());
        assert!(!LLMError::AuthenticationFailed.is_retryable());
        assert!(!LLMError::ModelNotFound("x".to_string()).is_retryable());
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(LLMError::Timeout(300).to_string(), "Request timed out after 300s");
    }
}
