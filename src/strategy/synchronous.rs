//! Single-attempt retrieval on the caller's task.

use super::RetrievalStrategy;
use crate::error::{Error, Result};
use crate::fetcher::RecordFetcher;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Retrieval strategy that performs exactly one fetch per call
///
/// Fetch errors are returned to the caller instead of being retried. Useful
/// when the data source is fast enough that overlapping attempts only add load.
pub struct SynchronousRetrievalStrategy<F: RecordFetcher> {
    fetcher: F,
    shard_id: String,
    shut_down: AtomicBool,
}

impl<F: RecordFetcher> SynchronousRetrievalStrategy<F> {
    /// Create a strategy reading from `fetcher`
    pub fn new(fetcher: F, shard_id: impl Into<String>) -> Self {
        Self {
            fetcher,
            shard_id: shard_id.into(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Shard this strategy reads from
    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }
}

#[async_trait]
impl<F: RecordFetcher> RetrievalStrategy for SynchronousRetrievalStrategy<F> {
    type Records = F::Records;

    async fn get_records(
        &self,
        max_records: usize,
        interrupt: &CancellationToken,
    ) -> Result<Option<F::Records>> {
        if self.is_shutdown() {
            return Err(Error::ShutDown);
        }

        tokio::select! {
            biased;
            _ = interrupt.cancelled() => {
                tracing::warn!(shard_id = %self.shard_id, "Interrupted while waiting for records");
                Ok(None)
            }
            fetched = self.fetcher.fetch(max_records) => Ok(Some(fetched?.accept())),
        }
    }

    fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            tracing::info!(shard_id = %self.shard_id, "Shutting down retrieval strategy");
        }
    }

    fn is_shutdown(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
