//! # shard-fetch
//!
//! Per-shard record retrieval with overlapping, bounded fetch attempts.
//!
//! ## Design Philosophy
//!
//! shard-fetch is designed to be:
//! - **Latency-tolerant** - A slow or hung fetch is overtaken by a fresh attempt
//!   instead of stalling the consumer
//! - **Exactly-once commit** - Whatever number of attempts a call launches, only
//!   one result is accepted and the shard position advances once
//! - **Bounded** - Attempts run on a small worker pool that rejects work instead
//!   of queueing without limit
//! - **Library-first** - The data source is a [`RecordFetcher`] you implement
//!
//! ## Quick Start
//!
//! ```no_run
//! use shard_fetch::{FetchAttemptResult, RecordFetcher, RetrievalStrategy, StrategyConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Shard;
//!
//! #[async_trait::async_trait]
//! impl RecordFetcher for Shard {
//!     type Records = Vec<u64>;
//!
//!     async fn fetch(&self, max_records: usize) -> shard_fetch::Result<FetchAttemptResult<Vec<u64>>> {
//!         let records: Vec<u64> = (0..max_records as u64).collect();
//!         Ok(FetchAttemptResult::new(records, |records: &Vec<u64>| {
//!             println!("advancing shard position by {}", records.len());
//!         }))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StrategyConfig::for_shard("shardId-000000000001");
//!     let strategy = config.build(Shard)?;
//!
//!     let interrupt = CancellationToken::new();
//!     if let Some(records) = strategy.get_records(100, &interrupt).await? {
//!         println!("processing {} records", records.len());
//!     }
//!
//!     strategy.shutdown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// The external fetch collaborator
pub mod fetcher;
/// Ambient metrics scope propagation
pub mod metrics;
/// Bounded worker pool
pub mod pool;
/// Retrieval strategies (decomposed into focused submodules)
pub mod strategy;

// Re-export commonly used types
pub use config::{PoolConfig, StrategyConfig};
pub use error::{Error, PoolError, Result};
pub use fetcher::{FetchAttemptResult, RecordFetcher};
pub use metrics::MetricsScope;
pub use pool::{PoolStats, WorkerPool};
pub use strategy::{
    AsyncRetrievalStrategy, RetrievalStats, RetrievalStrategy, SynchronousRetrievalStrategy,
};
