//! Shutdown coordination.

use super::AsyncRetrievalStrategy;
use crate::fetcher::RecordFetcher;

impl<F: RecordFetcher> AsyncRetrievalStrategy<F> {
    /// Shut down the strategy's worker pool
    ///
    /// Running attempts are cancelled, queued attempts are discarded and no
    /// further attempts are accepted. Subsequent `get_records` calls fail with
    /// [`Error::ShutDown`](crate::Error::ShutDown); a call already in progress
    /// gives up and returns `Ok(None)`. Calling this again has no effect.
    pub fn shutdown(&self) {
        if self.pool.is_shutdown() {
            tracing::debug!(shard_id = %self.shard_id, "Strategy already shut down");
            return;
        }
        tracing::info!(shard_id = %self.shard_id, "Shutting down retrieval strategy");
        self.pool.shutdown();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutdown(&self) -> bool {
        self.pool.is_shutdown()
    }
}
