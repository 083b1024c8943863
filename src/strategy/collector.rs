//! Completion-ordered collection of attempt results
//!
//! Every attempt submitted through a [`CompletionCollector`] pushes its own
//! [`CompletedAttempt`] into the collector's channel when it finishes, so results
//! are observed in the order they complete rather than the order they were
//! submitted. Completions are buffered until polled, and one collector is used per
//! logical call: a late attempt from an earlier call can only reach that call's
//! (already dropped) channel.

use super::attempt::{AttemptHandle, AttemptId, AttemptTask, CompletedAttempt};
use crate::error::PoolError;
use crate::fetcher::RecordFetcher;
use crate::pool::WorkerPool;
use std::time::Duration;
use tokio::sync::mpsc;

/// Submits attempts to a pool and hands back whichever finishes next
pub struct CompletionCollector<'p, R> {
    pool: &'p WorkerPool,
    tx: mpsc::UnboundedSender<CompletedAttempt<R>>,
    rx: mpsc::UnboundedReceiver<CompletedAttempt<R>>,
    next_id: u64,
}

impl<'p, R: Send + 'static> CompletionCollector<'p, R> {
    /// Create a collector that runs attempts on `pool`
    pub fn new(pool: &'p WorkerPool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            pool,
            tx,
            rx,
            next_id: 0,
        }
    }

    /// Submit one run of `task` to the pool
    ///
    /// # Errors
    ///
    /// Returns the pool's rejection unchanged; nothing is registered in that case.
    pub fn submit<F>(&mut self, task: &AttemptTask<F>) -> Result<AttemptHandle, PoolError>
    where
        F: RecordFetcher<Records = R>,
    {
        let id = AttemptId(self.next_id);
        let token = self.pool.child_token();
        let run_token = token.clone();
        let task = task.clone();
        let tx = self.tx.clone();

        self.pool.execute(Box::pin(async move {
            let outcome = task.run(run_token).await;
            // The receiver is gone once the call has finished; nobody wants this result
            let _ = tx.send(CompletedAttempt { id, outcome });
        }))?;

        self.next_id += 1;
        Ok(AttemptHandle::new(id, token))
    }

    /// Wait up to `timeout` for the next attempt to finish
    ///
    /// Returns `None` if nothing finished in time.
    pub async fn poll(&mut self, timeout: Duration) -> Option<CompletedAttempt<R>> {
        // The collector holds a sender itself, so recv only ends by timing out
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Take a finished attempt if one is already waiting
    pub fn try_poll(&mut self) -> Option<CompletedAttempt<R>> {
        self.rx.try_recv().ok()
    }
}
