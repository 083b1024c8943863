//! The external fetch collaborator and its deferred, committable result
//!
//! A [`RecordFetcher`] performs one physical read against the data source. It does
//! not advance any read position by itself: it hands back a [`FetchAttemptResult`]
//! whose [`accept`](FetchAttemptResult::accept) performs that side effect. Retrieval
//! strategies accept exactly one result per logical call and simply drop the rest.

use async_trait::async_trait;
use std::fmt;

/// Commit hook run by [`FetchAttemptResult::accept`]
type CommitFn<R> = Box<dyn FnOnce(&R) + Send>;

/// Outcome of one physical fetch, not yet committed
///
/// # Examples
///
/// ```
/// use shard_fetch::FetchAttemptResult;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// let cursor = Arc::new(AtomicU64::new(100));
/// let next = cursor.clone();
/// let result = FetchAttemptResult::new(vec!["a", "b"], move |records: &Vec<&str>| {
///     next.fetch_add(records.len() as u64, Ordering::SeqCst);
/// });
///
/// assert_eq!(result.records().len(), 2);
/// assert_eq!(cursor.load(Ordering::SeqCst), 100, "peeking must not commit");
///
/// let records = result.accept();
/// assert_eq!(records, vec!["a", "b"]);
/// assert_eq!(cursor.load(Ordering::SeqCst), 102);
/// ```
#[must_use = "a fetched result does nothing until accepted"]
pub struct FetchAttemptResult<R> {
    records: R,
    on_accept: Option<CommitFn<R>>,
}

impl<R> FetchAttemptResult<R> {
    /// Create a result whose acceptance runs `on_accept` (e.g. advancing a shard iterator)
    pub fn new(records: R, on_accept: impl FnOnce(&R) + Send + 'static) -> Self {
        Self {
            records,
            on_accept: Some(Box::new(on_accept)),
        }
    }

    /// Create a result with no commit side effect
    pub fn without_commit(records: R) -> Self {
        Self {
            records,
            on_accept: None,
        }
    }

    /// Inspect the fetched payload without committing it
    pub fn records(&self) -> &R {
        &self.records
    }

    /// Commit this result and hand back the payload
    ///
    /// Consumes the result, so the commit hook can run at most once.
    pub fn accept(mut self) -> R {
        if let Some(commit) = self.on_accept.take() {
            commit(&self.records);
        }
        self.records
    }
}

impl<R: fmt::Debug> fmt::Debug for FetchAttemptResult<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchAttemptResult")
            .field("records", &self.records)
            .field("has_commit", &self.on_accept.is_some())
            .finish()
    }
}

/// Trait for the component that reads records from a shard
///
/// Implementations must tolerate being called concurrently and repeatedly for the
/// same logical read, from any worker. An error is treated by the asynchronous
/// strategy as a retryable failure.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use shard_fetch::{FetchAttemptResult, RecordFetcher};
///
/// struct Fixed;
///
/// #[async_trait]
/// impl RecordFetcher for Fixed {
///     type Records = Vec<u32>;
///
///     async fn fetch(&self, max_records: usize) -> shard_fetch::Result<FetchAttemptResult<Vec<u32>>> {
///         Ok(FetchAttemptResult::without_commit((0..max_records as u32).collect()))
///     }
/// }
/// ```
#[async_trait]
pub trait RecordFetcher: Send + Sync + 'static {
    /// Payload returned to the caller once a result is accepted
    type Records: Send + 'static;

    /// Read up to `max_records` records without committing the read position
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails; the caller decides whether to retry.
    async fn fetch(&self, max_records: usize) -> crate::Result<FetchAttemptResult<Self::Records>>;
}
