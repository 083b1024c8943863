//! Bounded worker pool for fetch attempts
//!
//! The pool runs boxed futures on long-lived worker tasks:
//! - at most `max_pool_size` jobs run at once, one per worker
//! - workers are started on demand; when none is free and the pool is at its
//!   maximum, up to `queue_capacity` jobs wait in the admission queue
//! - anything beyond that is rejected with [`PoolError::Saturated`] instead of
//!   blocking the submitter
//! - one core worker stays alive; the others retire after `keep_alive` of idleness
//!
//! Workers are plain tokio tasks, so they never keep the process alive on their own.
//! Each one is named `get-records-worker-<label>-<ordinal>`; the name is attached to
//! the worker's tracing span and can be read by the running job through
//! [`current_worker_name`].

use crate::config::PoolConfig;
use crate::error::PoolError;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Workers that are never retired for idleness
const CORE_POOL_SIZE: usize = 1;

/// A unit of work accepted by the pool
pub type Job = BoxFuture<'static, ()>;

tokio::task_local! {
    static WORKER_NAME: Arc<str>;
}

/// Name of the pool worker running the current task, if any
pub fn current_worker_name() -> Option<String> {
    WORKER_NAME.try_with(|name| name.to_string()).ok()
}

/// Point-in-time view of a pool's occupancy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Workers currently alive
    pub live_workers: usize,
    /// Workers currently running a job
    pub busy_workers: usize,
    /// Jobs accepted but not yet picked up by a worker
    pub queued: usize,
    /// Workers started over the pool's lifetime
    pub spawned_total: usize,
}

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Job>,
    /// Live worker tasks
    workers: usize,
    /// Live workers not currently running a job
    idle: usize,
}

struct Shared {
    name_prefix: String,
    max_workers: usize,
    keep_alive: Duration,
    queue_capacity: usize,
    state: Mutex<PoolState>,
    /// One permit per job sitting in `state.queue`
    jobs_available: Semaphore,
    shutdown: CancellationToken,
    next_ordinal: AtomicUsize,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// How long an idle worker waits for a job before trying to retire
    ///
    /// `None` while the pool is down to its core worker, which never retires.
    fn idle_deadline(&self) -> Option<Duration> {
        (self.lock_state().workers > CORE_POOL_SIZE).then_some(self.keep_alive)
    }

    fn spawn_worker(self: &Arc<Self>) {
        let ordinal = self.next_ordinal.fetch_add(1, Ordering::Relaxed);
        let name: Arc<str> = format!("{}-{}", self.name_prefix, ordinal).into();
        let span = tracing::debug_span!("worker", name = %name);
        tokio::spawn(run_worker(self.clone(), name).instrument(span));
    }
}

async fn run_worker(shared: Arc<Shared>, name: Arc<str>) {
    tracing::debug!("Worker started");

    loop {
        let acquired = match shared.idle_deadline() {
            Some(keep_alive) => tokio::time::timeout(keep_alive, shared.jobs_available.acquire())
                .await
                .ok(),
            None => Some(shared.jobs_available.acquire().await),
        };

        match acquired {
            Some(Ok(permit)) => {
                permit.forget();
                let job = {
                    let mut state = shared.lock_state();
                    let job = state.queue.pop_front();
                    if job.is_some() {
                        state.idle -= 1;
                    }
                    job
                };
                let Some(job) = job else { continue };

                let job = WORKER_NAME.scope(name.clone(), AssertUnwindSafe(job).catch_unwind());
                tokio::select! {
                    biased;
                    _ = shared.shutdown.cancelled() => {
                        tracing::debug!("Job cancelled by pool shutdown");
                    }
                    result = job => {
                        if result.is_err() {
                            tracing::error!("Job panicked on worker");
                        }
                    }
                }

                shared.lock_state().idle += 1;
            }
            // Semaphore closed: the pool is shutting down
            Some(Err(_)) => break,
            None => {
                let mut state = shared.lock_state();
                // Only retire if the remaining idle workers still cover the queued jobs
                if state.workers > CORE_POOL_SIZE && state.queue.len() < state.idle {
                    state.workers -= 1;
                    state.idle -= 1;
                    tracing::debug!(
                        keep_alive_ms = shared.keep_alive.as_millis(),
                        "Retiring idle worker"
                    );
                    return;
                }
            }
        }
    }

    let mut state = shared.lock_state();
    state.workers -= 1;
    state.idle -= 1;
    tracing::debug!("Worker stopped");
}

/// Bounded pool of named workers that rejects work instead of queueing without limit
///
/// Dropping the pool shuts it down.
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Create a pool for the shard identified by `label`
    ///
    /// No worker is started until the first job is submitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if `config` fails
    /// [`PoolConfig::validate`].
    pub fn new(label: &str, config: &PoolConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                name_prefix: format!("get-records-worker-{label}"),
                max_workers: config.max_pool_size,
                keep_alive: config.keep_alive,
                queue_capacity: config.queue_capacity,
                state: Mutex::new(PoolState::default()),
                jobs_available: Semaphore::new(0),
                shutdown: CancellationToken::new(),
                next_ordinal: AtomicUsize::new(0),
            }),
        })
    }

    /// Submit a job without waiting
    ///
    /// Must be called from within a tokio runtime, since it may start a worker.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Saturated`] if every worker is busy, the pool is at its
    ///   maximum size and the admission queue is full
    /// - [`PoolError::ShutDown`] if the pool has been shut down
    pub fn execute(&self, job: Job) -> Result<(), PoolError> {
        {
            let mut state = self.shared.lock_state();
            if self.shared.shutdown.is_cancelled() {
                return Err(PoolError::ShutDown);
            }

            // Idle workers not already spoken for by a queued job
            let free_workers = state.idle.saturating_sub(state.queue.len());
            if free_workers == 0 {
                if state.workers < self.shared.max_workers {
                    state.workers += 1;
                    state.idle += 1;
                    self.shared.spawn_worker();
                } else if state.queue.len() - state.idle >= self.shared.queue_capacity {
                    return Err(PoolError::Saturated);
                }
            }

            state.queue.push_back(job);
        }
        self.shared.jobs_available.add_permits(1);
        Ok(())
    }

    /// Stop accepting work and cancel everything running or queued
    ///
    /// Running jobs are dropped at their next await point; queued jobs are
    /// discarded without running. Calling this more than once has no further effect.
    pub fn shutdown(&self) {
        let discarded = {
            let mut state = self.shared.lock_state();
            if self.shared.shutdown.is_cancelled() {
                return;
            }
            self.shared.shutdown.cancel();
            self.shared.jobs_available.close();
            std::mem::take(&mut state.queue)
        };

        tracing::info!(
            pool = %self.shared.name_prefix,
            discarded = discarded.len(),
            "Worker pool shut down"
        );
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// A token that is cancelled when the pool shuts down
    pub fn child_token(&self) -> CancellationToken {
        self.shared.shutdown.child_token()
    }

    /// Maximum number of concurrently running jobs
    pub fn max_workers(&self) -> usize {
        self.shared.max_workers
    }

    /// Current occupancy
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.lock_state();
        PoolStats {
            live_workers: state.workers,
            busy_workers: state.workers - state.idle,
            queued: state.queue.len(),
            spawned_total: self.shared.next_ordinal.load(Ordering::Relaxed),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name_prefix", &self.shared.name_prefix)
            .field("max_workers", &self.shared.max_workers)
            .field("queue_capacity", &self.shared.queue_capacity)
            .field("is_shutdown", &self.is_shutdown())
            .finish()
    }
}
