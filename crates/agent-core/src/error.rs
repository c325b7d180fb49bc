//! Error types for agent-core

use thiserror::Error;

/// Result type alias for agent-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for agent lifecycle operations
#[derive(Error, Debug)]
pub enum Error {
    /// Agent shutdown failed
    #[error("Agent shutdown failed: {0}")]
    ShutdownFailed(String),
}
