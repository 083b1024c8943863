//! Shared test helpers: a record fetcher driven by a script of per-call behaviors.

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::fetcher::{FetchAttemptResult, RecordFetcher};
use crate::metrics;
use crate::pool::{WorkerPool, current_worker_name};
use crate::strategy::AsyncRetrievalStrategy;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What one call to [`ScriptedFetcher::fetch`] does
#[derive(Clone, Copy, Debug)]
pub(crate) enum Step {
    /// Sleep, then return `value` with a commit hook
    Succeed { after: Duration, value: u32 },
    /// Sleep, then return an error
    Fail { after: Duration },
    /// Never complete
    Hang,
    /// Panic immediately
    Panic,
}

impl Step {
    pub(crate) fn succeed(after_ms: u64, value: u32) -> Self {
        Step::Succeed {
            after: Duration::from_millis(after_ms),
            value,
        }
    }

    pub(crate) fn fail(after_ms: u64) -> Self {
        Step::Fail {
            after: Duration::from_millis(after_ms),
        }
    }
}

/// What the fetcher observed; shared with the test through an `Arc`
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    /// Calls to `fetch`
    pub(crate) fetches: AtomicU32,
    /// Fetches dropped before finishing
    pub(crate) cancelled: AtomicU32,
    /// Fetches that ran with a metrics scope installed
    pub(crate) scoped_fetches: AtomicU32,
    accepted: Mutex<Vec<u32>>,
    max_records: Mutex<Vec<usize>>,
    worker_names: Mutex<Vec<Option<String>>>,
}

impl Recorder {
    /// Values whose commit hook ran, in order
    pub(crate) fn accepted(&self) -> Vec<u32> {
        self.accepted.lock().unwrap().clone()
    }

    pub(crate) fn max_records_seen(&self) -> Vec<usize> {
        self.max_records.lock().unwrap().clone()
    }

    pub(crate) fn worker_names(&self) -> Vec<Option<String>> {
        self.worker_names.lock().unwrap().clone()
    }
}

/// Counts a fetch as cancelled if it is dropped before `finish`
struct CancelGuard {
    recorder: Arc<Recorder>,
    finished: bool,
}

impl CancelGuard {
    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.recorder.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Fetcher whose n-th call follows the n-th step; calls past the script hang
pub(crate) struct ScriptedFetcher {
    steps: Mutex<VecDeque<Step>>,
    pub(crate) recorder: Arc<Recorder>,
}

impl ScriptedFetcher {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            recorder: Arc::new(Recorder::default()),
        }
    }
}

/// Shard id used by strategies built with [`create_test_strategy`]
pub(crate) const TEST_SHARD: &str = "shardId-000000000001";

/// Helper to create an asynchronous strategy over a scripted fetcher.
/// Returns the strategy and the fetcher's recorder.
pub(crate) fn create_test_strategy(
    steps: Vec<Step>,
    max_pool_size: usize,
    queue_capacity: usize,
    retry_interval: Duration,
) -> (AsyncRetrievalStrategy<ScriptedFetcher>, Arc<Recorder>) {
    let fetcher = ScriptedFetcher::new(steps);
    let recorder = fetcher.recorder.clone();
    let pool = WorkerPool::new(
        TEST_SHARD,
        &PoolConfig {
            max_pool_size,
            keep_alive: Duration::from_secs(5),
            queue_capacity,
        },
    )
    .unwrap();
    let strategy =
        AsyncRetrievalStrategy::with_pool(fetcher, pool, retry_interval, TEST_SHARD).unwrap();
    (strategy, recorder)
}

/// Let worker tasks observe cancellations issued by a finished call
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[async_trait]
impl RecordFetcher for ScriptedFetcher {
    type Records = u32;

    async fn fetch(&self, max_records: usize) -> Result<FetchAttemptResult<u32>> {
        let call = self.recorder.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if metrics::current().is_some() {
            self.recorder.scoped_fetches.fetch_add(1, Ordering::SeqCst);
        }
        metrics::add_data("fetches", 1.0);
        self.recorder.max_records.lock().unwrap().push(max_records);
        self.recorder
            .worker_names
            .lock()
            .unwrap()
            .push(current_worker_name());

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Hang);
        let guard = CancelGuard {
            recorder: self.recorder.clone(),
            finished: false,
        };

        match step {
            Step::Succeed { after, value } => {
                tokio::time::sleep(after).await;
                guard.finish();
                let recorder = self.recorder.clone();
                Ok(FetchAttemptResult::new(value, move |value: &u32| {
                    recorder.accepted.lock().unwrap().push(*value);
                }))
            }
            Step::Fail { after } => {
                tokio::time::sleep(after).await;
                guard.finish();
                Err(Error::Fetch(format!("scripted failure on call {call}")))
            }
            Step::Hang => {
                futures::future::pending::<()>().await;
                unreachable!("pending never completes")
            }
            Step::Panic => {
                guard.finish();
                panic!("scripted panic on call {call}");
            }
        }
    }
}
