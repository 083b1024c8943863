//! A single physical fetch attempt and the handle used to cancel it.

use crate::error::Error;
use crate::fetcher::{FetchAttemptResult, RecordFetcher};
use crate::metrics::{self, MetricsScope};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Identifier of one attempt within a logical call
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an attempt ended
pub enum AttemptOutcome<R> {
    /// The fetch returned a result that has not been accepted yet
    Fetched(FetchAttemptResult<R>),
    /// The fetch returned an error or panicked
    Failed(Error),
    /// The attempt was cancelled before the fetch finished
    Cancelled,
}

impl<R> fmt::Debug for AttemptOutcome<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Fetched(_) => f.write_str("Fetched"),
            AttemptOutcome::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
            AttemptOutcome::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// A finished attempt as delivered by the completion collector
#[derive(Debug)]
pub struct CompletedAttempt<R> {
    /// Which attempt finished
    pub id: AttemptId,
    /// How it finished
    pub outcome: AttemptOutcome<R>,
}

/// Reusable definition of a fetch attempt for one logical call
///
/// Built once per call and cloned for every submission. Captures the metrics
/// scope of the task that built it so the fetch runs under the caller's scope
/// even though it executes on a pool worker.
pub struct AttemptTask<F: RecordFetcher> {
    fetcher: Arc<F>,
    max_records: usize,
    scope: Option<MetricsScope>,
}

impl<F: RecordFetcher> Clone for AttemptTask<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            max_records: self.max_records,
            scope: self.scope.clone(),
        }
    }
}

impl<F: RecordFetcher> AttemptTask<F> {
    /// Build an attempt, capturing the metrics scope of the current task
    pub fn new(fetcher: Arc<F>, max_records: usize) -> Self {
        Self::with_scope(fetcher, max_records, metrics::current())
    }

    /// Build an attempt that runs under an explicit scope (or none)
    pub fn with_scope(fetcher: Arc<F>, max_records: usize, scope: Option<MetricsScope>) -> Self {
        Self {
            fetcher,
            max_records,
            scope,
        }
    }

    /// Call the fetcher once, unless `cancel` fires first
    ///
    /// The captured scope is installed only while the fetch runs. A fetch error
    /// or panic becomes [`AttemptOutcome::Failed`].
    pub async fn run(self, cancel: CancellationToken) -> AttemptOutcome<F::Records> {
        if cancel.is_cancelled() {
            return AttemptOutcome::Cancelled;
        }

        let AttemptTask {
            fetcher,
            max_records,
            scope,
        } = self;
        let fetch = metrics::with_optional_scope(
            scope,
            AssertUnwindSafe(fetcher.fetch(max_records)).catch_unwind(),
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => AttemptOutcome::Cancelled,
            result = fetch => match result {
                Ok(Ok(fetched)) => AttemptOutcome::Fetched(fetched),
                Ok(Err(e)) => AttemptOutcome::Failed(e),
                Err(panic) => AttemptOutcome::Failed(Error::AttemptPanicked(panic_message(&*panic))),
            },
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Ownership token for a submitted attempt
///
/// Cancelling is a request: an attempt already inside the fetch stops at its
/// next await point, and any side effects it already started may still finish.
#[derive(Debug)]
pub struct AttemptHandle {
    id: AttemptId,
    token: CancellationToken,
}

impl AttemptHandle {
    pub(crate) fn new(id: AttemptId, token: CancellationToken) -> Self {
        Self { id, token }
    }

    /// Which attempt this handle controls
    pub fn id(&self) -> AttemptId {
        self.id
    }

    /// Ask the attempt to stop
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
