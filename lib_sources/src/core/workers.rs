//! # Worker Pool
//!
//! The pool every check runs on. It is built explicitly and handed to the
//! runner, so there is exactly one owner responsible for shutting it down.
//!
//! - Concurrency is bounded by a semaphore: a check waits for a permit before
//!   its probe starts, so the timeout only covers the probe itself.
//! - Every spawned task is tracked, and all of them observe one shutdown token.
//!   Shutdown cancels the token, closes the semaphore and waits for the tracked
//!   tasks to drain.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::errors::PollerError;

/// # Worker Pool
///
/// A bounded, cancellable set of tasks on a tokio runtime.
#[derive(Clone)]
pub struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl WorkerPool {
    /// Creates a pool spawning onto `handle`, running at most `max_concurrent`
    /// probes at once.
    pub fn new(handle: Handle, max_concurrent: usize) -> Self {
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Creates a pool on the runtime the caller is running in.
    pub fn on_current_runtime(max_concurrent: usize) -> Result<Self, PollerError> {
        Ok(Self::new(Handle::try_current()?, max_concurrent))
    }

    /// Spawns a tracked task. Returns `None` once the pool is shut down.
    pub fn spawn<F>(&self, task: F) -> Option<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.is_shut_down() {
            return None;
        }
        Some(self.tracker.spawn_on(task, &self.handle))
    }

    /// Waits for a probe permit. Returns `None` if the pool shuts down first.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
        }
    }

    /// The token cancelled at shutdown.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// True once [`shutdown`](Self::shutdown) has begun.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of tracked tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Cancels every task and waits up to `grace` for them to finish.
    ///
    /// Returns `true` if everything drained within the grace period.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.shutdown.cancel();
        self.permits.close();
        self.tracker.close();
        tokio::time::timeout(grace, self.tracker.wait()).await.is_ok()
    }
}
