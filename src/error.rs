//! Error types for shard-fetch
//!
//! Only two classes of failure ever reach the caller of a retrieval strategy:
//! - using a strategy after it has been shut down ([`Error::ShutDown`])
//! - building a strategy from an invalid configuration ([`Error::Config`])
//!
//! Failures of individual fetch attempts ([`Error::Fetch`], [`Error::AttemptPanicked`])
//! are absorbed by the asynchronous strategy and only surface to callers of the
//! synchronous strategy.

use thiserror::Error;

/// Result type alias for shard-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for shard-fetch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_pool_size")
        key: Option<String>,
    },

    /// The strategy has been shut down and no longer accepts work
    #[error("strategy has been shut down")]
    ShutDown,

    /// The external fetch call failed
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The external fetch call panicked on a worker
    #[error("fetch attempt panicked: {0}")]
    AttemptPanicked(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Reasons a worker pool refuses to accept a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Every worker is busy and the admission queue is full
    #[error("worker pool saturated: all workers busy and admission queue full")]
    Saturated,

    /// The pool has been shut down
    #[error("worker pool has been shut down")]
    ShutDown,
}
