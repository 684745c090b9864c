//! Bounded concurrency for in-flight API requests.
//!
//! This module provides the [`ConcurrencyLimiter`] struct which caps the
//! number of simultaneously executing requests under one client. Excess
//! calls queue in FIFO submission order; no fairness is guaranteed beyond
//! that.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, instrument};

/// Semaphore-backed limiter bounding simultaneously in-flight requests.
///
/// A capacity slot is acquired before a task starts and released when the
/// task settles, success or failure - the permit guard drops on every exit
/// path, so slots never leak.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ConcurrencyLimiter {
    /// Creates a limiter with `max_concurrent` capacity slots.
    ///
    /// `max_concurrent` is clamped to at least 1.
    #[must_use]
    #[instrument]
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        debug!(max_concurrent, "creating concurrency limiter");
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Returns the number of slots currently available.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Executes `task` once a capacity slot is free.
    ///
    /// The slot is held for the full duration of `task` and released when it
    /// settles. Queued callers are admitted in FIFO order.
    ///
    /// # Panics
    ///
    /// Panics if the internal semaphore is closed, which cannot happen: the
    /// limiter owns it privately and never closes it.
    #[allow(clippy::expect_used)]
    pub async fn run<T>(&self, task: impl Future<Output = T>) -> T {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("semaphore is owned by the limiter and never closed");
        task.await
    }
}
