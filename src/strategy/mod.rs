//! Retrieval strategies split into focused submodules.
//!
//! The [`AsyncRetrievalStrategy`] and its methods are organized by concern:
//! - [`attempt`] - One physical fetch attempt and its cancellation handle
//! - [`collector`] - Completion-ordered collection of attempt results
//! - [`orchestration`] - The overlapping retry loop behind `get_records`
//! - [`lifecycle`] - Shutdown coordination
//! - [`synchronous`] - The single-attempt strategy

pub mod attempt;
pub mod collector;
mod lifecycle;
mod orchestration;
mod synchronous;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use attempt::{AttemptHandle, AttemptId, AttemptOutcome, AttemptTask, CompletedAttempt};
pub use collector::CompletionCollector;
pub use synchronous::SynchronousRetrievalStrategy;

use crate::config::StrategyConfig;
use crate::error::{Error, Result};
use crate::fetcher::RecordFetcher;
use crate::pool::WorkerPool;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Common interface of the per-shard record retrieval strategies
///
/// Owned by the task that consumes a shard; that task calls
/// [`get_records`](Self::get_records) for every batch it processes.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Payload handed to the caller for each accepted fetch
    type Records: Send;

    /// Fetch and commit up to `max_records` records
    ///
    /// Returns `Ok(None)` only when `interrupt` fires (or the strategy is shut
    /// down) before a result was committed. That means "retry later", not "no data".
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutDown`](crate::Error::ShutDown) if the strategy has
    /// already been shut down.
    async fn get_records(
        &self,
        max_records: usize,
        interrupt: &CancellationToken,
    ) -> Result<Option<Self::Records>>;

    /// Stop the strategy and cancel any outstanding work; idempotent
    fn shutdown(&self);

    /// Whether [`shutdown`](Self::shutdown) has been called
    fn is_shutdown(&self) -> bool;
}

/// Counters describing what a strategy has done so far
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetrievalStats {
    /// Attempts accepted by the worker pool
    pub attempts_submitted: u64,
    /// Submissions rejected because the pool was saturated
    pub submissions_rejected: u64,
    /// Attempts whose fetch returned an error or panicked
    pub attempts_failed: u64,
    /// Results accepted and returned to the caller
    pub results_committed: u64,
    /// Calls abandoned without a result
    pub calls_interrupted: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    attempts_submitted: AtomicU64,
    submissions_rejected: AtomicU64,
    attempts_failed: AtomicU64,
    results_committed: AtomicU64,
    calls_interrupted: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn attempt_submitted(&self) {
        self.attempts_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn submission_rejected(&self) {
        self.submissions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn attempt_failed(&self) {
        self.attempts_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn result_committed(&self) {
        self.results_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn call_interrupted(&self) {
        self.calls_interrupted.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RetrievalStats {
        RetrievalStats {
            attempts_submitted: self.attempts_submitted.load(Ordering::Relaxed),
            submissions_rejected: self.submissions_rejected.load(Ordering::Relaxed),
            attempts_failed: self.attempts_failed.load(Ordering::Relaxed),
            results_committed: self.results_committed.load(Ordering::Relaxed),
            calls_interrupted: self.calls_interrupted.load(Ordering::Relaxed),
        }
    }
}

/// Retrieval strategy that overlaps fetch attempts on a bounded worker pool
///
/// Each call to `get_records` submits an attempt and waits up to the retry
/// interval for any outstanding attempt to finish. If none does, it submits
/// another one and waits again, for as long as it takes. The first attempt to
/// finish successfully is the only one accepted; every other attempt of the
/// call is cancelled and its result discarded, so the shard's read position
/// advances exactly once per call.
///
/// # Example
///
/// ```no_run
/// use shard_fetch::{AsyncRetrievalStrategy, FetchAttemptResult, RecordFetcher, StrategyConfig};
/// use tokio_util::sync::CancellationToken;
///
/// struct Shard;
///
/// #[async_trait::async_trait]
/// impl RecordFetcher for Shard {
///     type Records = Vec<String>;
///
///     async fn fetch(&self, max_records: usize) -> shard_fetch::Result<FetchAttemptResult<Vec<String>>> {
///         Ok(FetchAttemptResult::without_commit(Vec::with_capacity(max_records)))
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() -> shard_fetch::Result<()> {
/// let config = StrategyConfig::for_shard("shardId-000000000001");
/// let strategy = AsyncRetrievalStrategy::new(Shard, &config)?;
///
/// let interrupt = CancellationToken::new();
/// if let Some(records) = strategy.get_records(1000, &interrupt).await? {
///     println!("got {} records", records.len());
/// }
/// strategy.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct AsyncRetrievalStrategy<F: RecordFetcher> {
    fetcher: Arc<F>,
    pool: WorkerPool,
    retry_interval: Duration,
    shard_id: String,
    stats: StatsCounters,
}

impl<F: RecordFetcher> AsyncRetrievalStrategy<F> {
    /// Create a strategy with its own worker pool, sized by `config`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration is invalid.
    pub fn new(fetcher: F, config: &StrategyConfig) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(&config.shard_id, &config.pool)?;
        Self::with_pool(
            fetcher,
            pool,
            config.retry_interval,
            config.shard_id.clone(),
        )
    }

    /// Create a strategy around an existing pool
    ///
    /// The strategy takes ownership of the pool and shuts it down with itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if `retry_interval` is zero.
    pub fn with_pool(
        fetcher: F,
        pool: WorkerPool,
        retry_interval: Duration,
        shard_id: impl Into<String>,
    ) -> Result<Self> {
        if retry_interval.is_zero() {
            return Err(Error::config(
                "retry_interval",
                "retry interval must be greater than zero",
            ));
        }
        Ok(Self {
            fetcher: Arc::new(fetcher),
            pool,
            retry_interval,
            shard_id: shard_id.into(),
            stats: StatsCounters::default(),
        })
    }

    /// Shard this strategy reads from
    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    /// How long each wait lasts before another attempt is launched
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// The worker pool running this strategy's attempts
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Counters accumulated over the strategy's lifetime
    pub fn stats(&self) -> RetrievalStats {
        self.stats.snapshot()
    }
}

#[async_trait]
impl<F: RecordFetcher> RetrievalStrategy for AsyncRetrievalStrategy<F> {
    type Records = F::Records;

    async fn get_records(
        &self,
        max_records: usize,
        interrupt: &CancellationToken,
    ) -> Result<Option<F::Records>> {
        AsyncRetrievalStrategy::get_records(self, max_records, interrupt).await
    }

    fn shutdown(&self) {
        AsyncRetrievalStrategy::shutdown(self);
    }

    fn is_shutdown(&self) -> bool {
        AsyncRetrievalStrategy::is_shutdown(self)
    }
}
