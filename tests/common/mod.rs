//! Common test utilities for shard-fetch integration tests

use async_trait::async_trait;
use shard_fetch::{FetchAttemptResult, RecordFetcher};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One batch of sequence numbers read from a simulated shard
pub type Batch = Vec<u64>;

/// Latency used once the scripted latencies run out
const DEFAULT_LATENCY: Duration = Duration::from_millis(10);

/// In-memory shard whose read position only moves when a batch is accepted
///
/// Every fetch reads from the current position, so attempts that overlap within
/// one call all see the same records. Each fetch takes the next scripted latency.
pub struct SimulatedShard {
    position: Arc<AtomicU64>,
    latencies: Mutex<VecDeque<Duration>>,
}

impl SimulatedShard {
    pub fn new(latencies_ms: &[u64]) -> Self {
        Self {
            position: Arc::new(AtomicU64::new(0)),
            latencies: Mutex::new(
                latencies_ms
                    .iter()
                    .map(|ms| Duration::from_millis(*ms))
                    .collect(),
            ),
        }
    }

    /// Handle to the committed read position, readable after the shard is moved
    pub fn position(&self) -> Arc<AtomicU64> {
        self.position.clone()
    }
}

#[async_trait]
impl RecordFetcher for SimulatedShard {
    type Records = Batch;

    async fn fetch(&self, max_records: usize) -> shard_fetch::Result<FetchAttemptResult<Batch>> {
        let start = self.position.load(Ordering::SeqCst);
        let latency = self
            .latencies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DEFAULT_LATENCY);

        tokio::time::sleep(latency).await;

        let batch: Batch = (start..start + max_records as u64).collect();
        let position = self.position.clone();
        Ok(FetchAttemptResult::new(batch, move |batch: &Batch| {
            let end = batch.last().map_or(start, |last| last + 1);
            let previous = position.swap(end, Ordering::SeqCst);
            assert_eq!(previous, start, "batch committed from a stale position");
        }))
    }
}

/// Assert that batches follow each other with no gap and no duplicate
pub fn assert_contiguous(batches: &[Batch]) {
    let mut expected = 0;
    for batch in batches {
        for record in batch {
            assert_eq!(*record, expected, "records must be contiguous across batches");
            expected += 1;
        }
    }
}
