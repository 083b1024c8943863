//! Ambient metrics scope propagated from a caller to the attempts it launches
//!
//! A caller installs a [`MetricsScope`] around its work with [`MetricsScope::scope`].
//! Anything running inside that future, including the record fetcher, can reach
//! it through [`current`] or record into it through [`add_data`]. Fetch attempts run
//! on pool workers, so the retrieval strategy captures the caller's scope when an
//! attempt is built and re-installs it only for the duration of that attempt.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

tokio::task_local! {
    static CURRENT_SCOPE: MetricsScope;
}

/// Thread-safe, clonable accumulator of named datapoints
///
/// Clones share the same underlying storage, so datapoints recorded by attempts
/// on worker tasks are visible to the caller that created the scope.
#[derive(Clone, Debug, Default)]
pub struct MetricsScope {
    data: Arc<Mutex<HashMap<String, Datapoint>>>,
}

/// Aggregated values recorded under one metric name
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Datapoint {
    /// Number of values recorded
    pub count: u64,
    /// Sum of all recorded values
    pub sum: f64,
    /// Largest recorded value
    pub max: f64,
}

impl MetricsScope {
    /// Create an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value under `name`
    pub fn add_data(&self, name: &str, value: f64) {
        let mut data = match self.data.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = data.entry(name.to_string()).or_default();
        if entry.count == 0 || value > entry.max {
            entry.max = value;
        }
        entry.count += 1;
        entry.sum += value;
    }

    /// Read the aggregate for `name`, if anything was recorded
    pub fn get(&self, name: &str) -> Option<Datapoint> {
        let data = match self.data.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        data.get(name).copied()
    }

    /// Whether two handles refer to the same underlying scope
    pub fn same_scope(&self, other: &MetricsScope) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Run `fut` with this scope installed as the current one
    ///
    /// The scope is removed when `fut` completes, fails, or is dropped.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT_SCOPE.scope(self, fut).await
    }
}

/// The scope installed on the current task, if any
pub fn current() -> Option<MetricsScope> {
    CURRENT_SCOPE.try_with(MetricsScope::clone).ok()
}

/// Record a value into the current scope; does nothing when no scope is installed
pub fn add_data(name: &str, value: f64) {
    // try_with only fails when no scope is installed, which is not an error here
    let _ = CURRENT_SCOPE.try_with(|scope| scope.add_data(name, value));
}

/// Run `fut` under `scope` when one was captured, or as-is otherwise
pub(crate) async fn with_optional_scope<F: Future>(scope: Option<MetricsScope>, fut: F) -> F::Output {
    match scope {
        Some(scope) => scope.scope(fut).await,
        None => fut.await,
    }
}
