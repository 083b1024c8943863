//! The overlapping retry loop behind `get_records`.

use super::AsyncRetrievalStrategy;
use super::attempt::{AttemptHandle, AttemptId, AttemptOutcome, AttemptTask};
use super::collector::CompletionCollector;
use crate::error::{Error, PoolError, Result};
use crate::fetcher::RecordFetcher;
use tokio_util::sync::CancellationToken;

/// Attempts submitted during one call that may still be running
///
/// Anything left here when the call ends is cancelled, including when the
/// call's future is dropped mid-wait.
#[derive(Default)]
struct InFlight {
    handles: Vec<AttemptHandle>,
}

impl InFlight {
    fn push(&mut self, handle: AttemptHandle) {
        self.handles.push(handle);
    }

    /// Forget an attempt that has already reported back
    fn finished(&mut self, id: AttemptId) {
        self.handles.retain(|handle| handle.id() != id);
    }

    fn len(&self) -> usize {
        self.handles.len()
    }

    /// Cancel and forget every handle; returns how many were cancelled
    fn cancel_all(&mut self) -> usize {
        let count = self.handles.len();
        for handle in self.handles.drain(..) {
            handle.cancel();
        }
        count
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl<F: RecordFetcher> AsyncRetrievalStrategy<F> {
    /// Fetch and commit up to `max_records` records
    ///
    /// Keeps launching overlapping attempts, one per retry interval, until one
    /// of them returns a result. Only that result is accepted. Failed attempts
    /// are logged and retried; a saturated pool just means waiting longer for the
    /// attempts already running.
    ///
    /// Returns `Ok(None)` if `interrupt` fires or the strategy is shut down
    /// before any attempt succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutDown`] if the strategy was shut down before the call.
    pub async fn get_records(
        &self,
        max_records: usize,
        interrupt: &CancellationToken,
    ) -> Result<Option<F::Records>> {
        if self.pool.is_shutdown() {
            return Err(Error::ShutDown);
        }

        let task = AttemptTask::new(self.fetcher.clone(), max_records);
        let mut collector = CompletionCollector::new(&self.pool);
        let mut in_flight = InFlight::default();
        let mut result: Option<F::Records> = None;

        loop {
            match collector.submit(&task) {
                Ok(handle) => {
                    self.stats.attempt_submitted();
                    tracing::debug!(
                        shard_id = %self.shard_id,
                        attempt_id = %handle.id(),
                        max_records,
                        "Submitted fetch attempt"
                    );
                    in_flight.push(handle);
                }
                Err(PoolError::Saturated) => {
                    self.stats.submission_rejected();
                    tracing::warn!(
                        shard_id = %self.shard_id,
                        in_flight = in_flight.len(),
                        "Out of resources, unable to start additional requests"
                    );
                }
                Err(PoolError::ShutDown) => {
                    self.stats.call_interrupted();
                    tracing::warn!(
                        shard_id = %self.shard_id,
                        "Strategy shut down while getting records, abandoning call"
                    );
                    break;
                }
            }

            let completed = tokio::select! {
                biased;
                _ = interrupt.cancelled() => {
                    self.stats.call_interrupted();
                    tracing::warn!(
                        shard_id = %self.shard_id,
                        in_flight = in_flight.len(),
                        "Interrupted while waiting for records"
                    );
                    break;
                }
                completed = collector.poll(self.retry_interval) => completed,
            };

            let Some(completed) = completed else {
                tracing::debug!(
                    shard_id = %self.shard_id,
                    retry_interval_ms = self.retry_interval.as_millis(),
                    "No attempt finished within retry interval"
                );
                continue;
            };

            in_flight.finished(completed.id);
            match completed.outcome {
                AttemptOutcome::Fetched(fetched) => {
                    // Single commit point for the call
                    debug_assert!(result.is_none(), "a call commits at most one attempt");
                    result = Some(fetched.accept());
                    self.stats.result_committed();
                    tracing::debug!(
                        shard_id = %self.shard_id,
                        attempt_id = %completed.id,
                        "Committed fetch attempt"
                    );
                    break;
                }
                AttemptOutcome::Failed(e) => {
                    self.stats.attempt_failed();
                    tracing::error!(
                        shard_id = %self.shard_id,
                        attempt_id = %completed.id,
                        error = %e,
                        "Fetch attempt failed while getting records"
                    );
                }
                AttemptOutcome::Cancelled => {
                    tracing::debug!(
                        shard_id = %self.shard_id,
                        attempt_id = %completed.id,
                        "Fetch attempt was cancelled"
                    );
                }
            }
        }

        let cancelled = in_flight.cancel_all();
        tracing::debug!(
            shard_id = %self.shard_id,
            cancelled,
            committed = result.is_some(),
            "Finished getting records"
        );
        Ok(result)
    }
}
