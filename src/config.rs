//! Configuration types for shard-fetch

use crate::error::{Error, Result};
use crate::fetcher::RecordFetcher;
use crate::strategy::{AsyncRetrievalStrategy, RetrievalStrategy, SynchronousRetrievalStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Worker pool tunables
///
/// Used as a nested sub-config within [`StrategyConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of concurrently running fetch attempts (default: 10)
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,

    /// How long a worker beyond the core worker may sit idle before it is retired (default: 5 seconds)
    #[serde(default = "default_keep_alive", with = "duration_serde")]
    pub keep_alive: Duration,

    /// Number of submissions that may wait for a free worker (default: 1)
    ///
    /// Submissions beyond this while every worker is busy are rejected.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: default_max_pool_size(),
            keep_alive: default_keep_alive(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl PoolConfig {
    /// Check that the pool can be built from these settings
    pub fn validate(&self) -> Result<()> {
        if self.max_pool_size == 0 {
            return Err(Error::config(
                "pool.max_pool_size",
                "max pool size must be at least 1",
            ));
        }
        if self.keep_alive.is_zero() {
            return Err(Error::config(
                "pool.keep_alive",
                "keep-alive must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Configuration for a per-shard retrieval strategy
///
/// # Example
///
/// ```
/// use shard_fetch::config::StrategyConfig;
///
/// let config = StrategyConfig::from_json(
///     r#"{ "shard_id": "shardId-000000000001", "retry_interval": 2 }"#,
/// ).unwrap();
/// assert_eq!(config.retry_interval.as_secs(), 2);
/// assert_eq!(config.pool.max_pool_size, 10);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Shard being read; used only for worker names and log fields
    #[serde(default)]
    pub shard_id: String,

    /// How long to wait for an outstanding attempt before launching another one (default: 1 second)
    #[serde(default = "default_retry_interval", with = "duration_serde")]
    pub retry_interval: Duration,

    /// Use overlapping attempts on a worker pool (default: true)
    ///
    /// When false, each call performs a single fetch on the caller's task.
    #[serde(default = "default_true")]
    pub asynchronous: bool,

    /// Worker pool settings (only used by the asynchronous strategy)
    #[serde(default)]
    pub pool: PoolConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            shard_id: String::new(),
            retry_interval: default_retry_interval(),
            asynchronous: true,
            pool: PoolConfig::default(),
        }
    }
}

impl StrategyConfig {
    /// Create a configuration with defaults for the given shard
    pub fn for_shard(shard_id: impl Into<String>) -> Self {
        Self {
            shard_id: shard_id.into(),
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON, filling in defaults and validating it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StrategyConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration describes a usable strategy
    pub fn validate(&self) -> Result<()> {
        if self.retry_interval.is_zero() {
            return Err(Error::config(
                "retry_interval",
                "retry interval must be greater than zero",
            ));
        }
        self.pool.validate()
    }

    /// Build the strategy this configuration describes
    ///
    /// Returns the asynchronous strategy unless `asynchronous` is false.
    /// Must be called from within a tokio runtime.
    pub fn build<F: RecordFetcher>(
        &self,
        fetcher: F,
    ) -> Result<Arc<dyn RetrievalStrategy<Records = F::Records>>> {
        self.validate()?;
        if self.asynchronous {
            Ok(Arc::new(AsyncRetrievalStrategy::new(fetcher, self)?))
        } else {
            Ok(Arc::new(SynchronousRetrievalStrategy::new(
                fetcher,
                self.shard_id.clone(),
            )))
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_pool_size() -> usize {
    10
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(5)
}

fn default_queue_capacity() -> usize {
    1
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
