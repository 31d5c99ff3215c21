//! # Poller
//!
//! The generic check engine. Given a key and a probe future it runs at most one
//! check per key at a time, bounds the probe with a timeout, classifies how it
//! ended and publishes the resulting value into the registry.
//!
//! ## Workflow of one check:
//! 1.  **Lock**: try the key's lock without waiting. A missing slot means the
//!     key was never bound and the call is a no-op; a held lock means a check is
//!     already running and this one is skipped.
//! 2.  **Permit**: on a pool worker, wait for a concurrency permit.
//! 3.  **Probe**: spawn the probe as its own task and wait on it with a deadline.
//!     The spawned task is the boundary that turns panics into values.
//! 4.  **Classify**: value, timeout (probe aborted), error or panic become a
//!     cache value through the [`CheckKind`]. External cancellation and shutdown
//!     become no value at all.
//! 5.  **Publish**: replace the cache entry, unless the slot was unbound or
//!     re-created meanwhile, or the pool is shutting down.
//! 6.  **Release**: the lock ticket is dropped on every exit path, including the
//!     check task itself being aborted.
//!
//! Nothing a probe does escapes `check_status`: it never returns an error and
//! never panics because of the probe.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::task::AbortOnDropHandle;

use crate::core::check::{panic_message, CheckFailure, CheckKind, CheckOutcome};
use crate::core::observer::{PollEvent, PollObserver};
use crate::core::registry::{Cached, CheckTicket, LockAttempt, Registry};
use crate::core::workers::WorkerPool;

/// What `check_status` did with the request.
pub enum Dispatch<V> {
    /// A check was started; the handle resolves to its outcome.
    Started(CheckHandle<V>),
    /// A check for this key is already running. Nothing was started.
    Busy,
    /// The previous attempt is too recent. Nothing was started.
    Throttled,
    /// The key is not bound. Nothing was started.
    Unknown,
    /// The worker pool is shut down. Nothing was started.
    Closed,
}

impl<V> Dispatch<V> {
    /// True if a check was started.
    pub fn is_started(&self) -> bool {
        matches!(self, Dispatch::Started(_))
    }
}

impl<V> fmt::Debug for Dispatch<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dispatch::Started(_) => "Started",
            Dispatch::Busy => "Busy",
            Dispatch::Throttled => "Throttled",
            Dispatch::Unknown => "Unknown",
            Dispatch::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// A running check.
pub struct CheckHandle<V> {
    inner: JoinHandle<CheckOutcome<V>>,
}

impl<V> CheckHandle<V> {
    /// Waits for the check to finish. `None` if the check task was aborted.
    pub async fn wait(self) -> Option<CheckOutcome<V>> {
        self.inner.await.ok()
    }

    /// Aborts the check task. The probe is aborted with it, the lock is
    /// released and nothing is published.
    pub fn abort(&self) {
        self.inner.abort();
    }
}

/// # Poller
///
/// Runs bounded, de-duplicated checks for keys registered in a shared
/// [`Registry`].
pub struct Poller<K, C: CheckKind> {
    kind: Arc<C>,
    registry: Arc<Registry<K, C::Value>>,
    pool: WorkerPool,
    timeout: Duration,
    observer: Arc<dyn PollObserver>,
}

impl<K, C> Poller<K, C>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
    C: CheckKind,
{
    /// Creates a poller publishing into `registry` and running on `pool`.
    pub fn new(
        kind: C,
        registry: Arc<Registry<K, C::Value>>,
        pool: WorkerPool,
        timeout: Duration,
        observer: Arc<dyn PollObserver>,
    ) -> Self {
        Self {
            kind: Arc::new(kind),
            registry,
            pool,
            timeout,
            observer,
        }
    }

    /// Starts one check of `key` with `probe`, unless one is already running.
    pub fn check_status<F>(&self, key: &K, probe: F) -> Dispatch<C::Value>
    where
        F: Future<Output = anyhow::Result<C::Output>> + Send + 'static,
    {
        self.dispatch(key, None, probe)
    }

    /// Like [`check_status`](Self::check_status), but refused while the last
    /// dispatched attempt for `key` is younger than `min_interval`.
    pub fn check_status_throttled<F>(
        &self,
        key: &K,
        min_interval: Duration,
        probe: F,
    ) -> Dispatch<C::Value>
    where
        F: Future<Output = anyhow::Result<C::Output>> + Send + 'static,
    {
        self.dispatch(key, Some(min_interval), probe)
    }

    /// The last published value for `key`, without its timestamp.
    pub fn cached_value(&self, key: &K) -> Option<C::Value> {
        self.registry.cached(key).map(Cached::into_value)
    }

    /// The last published value for `key`, with the time it was recorded.
    pub fn cached(&self, key: &K) -> Option<Cached<C::Value>> {
        self.registry.cached(key)
    }

    /// The registry this poller publishes into.
    pub fn registry(&self) -> &Arc<Registry<K, C::Value>> {
        &self.registry
    }

    /// The check kind.
    pub fn kind(&self) -> &C {
        &self.kind
    }

    /// The per-check timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn dispatch<F>(&self, key: &K, min_interval: Option<Duration>, probe: F) -> Dispatch<C::Value>
    where
        F: Future<Output = anyhow::Result<C::Output>> + Send + 'static,
    {
        if self.pool.is_shut_down() {
            return Dispatch::Closed;
        }

        let ticket = match self.registry.try_begin(key, min_interval) {
            LockAttempt::Acquired(ticket) => ticket,
            LockAttempt::Unknown => return Dispatch::Unknown,
            LockAttempt::Busy => {
                self.observer.on_event(&PollEvent::CheckSkipped { source: key.to_string() });
                return Dispatch::Busy;
            }
            LockAttempt::Throttled => {
                self.observer.on_event(&PollEvent::RecheckThrottled { source: key.to_string() });
                return Dispatch::Throttled;
            }
        };

        let job = CheckJob {
            key: key.clone(),
            ticket,
            kind: Arc::clone(&self.kind),
            registry: Arc::clone(&self.registry),
            pool: self.pool.clone(),
            timeout: self.timeout,
            observer: Arc::clone(&self.observer),
        };

        // A refused spawn drops the job, and the ticket with it.
        match self.pool.spawn(job.run(probe)) {
            Some(inner) => Dispatch::Started(CheckHandle { inner }),
            None => Dispatch::Closed,
        }
    }
}

/// Everything one check task owns.
struct CheckJob<K, C: CheckKind> {
    key: K,
    ticket: CheckTicket,
    kind: Arc<C>,
    registry: Arc<Registry<K, C::Value>>,
    pool: WorkerPool,
    timeout: Duration,
    observer: Arc<dyn PollObserver>,
}

impl<K, C> CheckJob<K, C>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
    C: CheckKind,
{
    async fn run<F>(self, probe: F) -> CheckOutcome<C::Value>
    where
        F: Future<Output = anyhow::Result<C::Output>> + Send + 'static,
    {
        let source = self.key.to_string();

        let Some(_permit) = self.pool.acquire().await else {
            self.observer.on_event(&PollEvent::CheckInterrupted { source });
            return CheckOutcome::Interrupted;
        };
        let Some(handle) = self.pool.spawn(probe) else {
            self.observer.on_event(&PollEvent::CheckInterrupted { source });
            return CheckOutcome::Interrupted;
        };

        let mut probe = AbortOnDropHandle::new(handle);
        let started = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = self.pool.shutdown_token().cancelled() => {
                probe.abort();
                CheckOutcome::Interrupted
            }
            result = tokio::time::timeout(self.timeout, &mut probe) => match result {
                Ok(Ok(Ok(output))) => CheckOutcome::Completed(self.kind.on_value(output)),
                Ok(Ok(Err(error))) => {
                    let failure = CheckFailure::Error(format!("{:#}", error));
                    CheckOutcome::Failed { value: self.kind.on_failure(&failure), failure }
                }
                Ok(Err(join_error)) if join_error.is_panic() => {
                    let failure = CheckFailure::Panicked(panic_message(join_error.into_panic()));
                    CheckOutcome::Failed { value: self.kind.on_failure(&failure), failure }
                }
                Ok(Err(_)) => CheckOutcome::Cancelled,
                Err(_) => {
                    probe.abort();
                    CheckOutcome::TimedOut(self.kind.on_timeout())
                }
            }
        };

        self.report(&source, &outcome, started.elapsed());

        if let Some(value) = outcome.value() {
            let published = !self.pool.is_shut_down()
                && self.registry.publish(&self.key, self.ticket.generation(), value.clone());
            if !published {
                self.observer.on_event(&PollEvent::ResultDiscarded { source });
            }
        }

        outcome
    }

    fn report(&self, source: &str, outcome: &CheckOutcome<C::Value>, elapsed: Duration) {
        let check = self.kind.name();
        let source = source.to_string();
        let event = match outcome {
            CheckOutcome::Completed(value) => PollEvent::CheckCompleted {
                source,
                check,
                value: format!("{:?}", value),
                elapsed,
            },
            CheckOutcome::TimedOut(_) => PollEvent::CheckTimedOut {
                source,
                check,
                timeout: self.timeout,
            },
            CheckOutcome::Failed { failure, .. } => PollEvent::CheckFailed {
                source,
                check,
                error: failure.to_string(),
            },
            CheckOutcome::Cancelled => PollEvent::CheckCancelled { source },
            CheckOutcome::Interrupted => PollEvent::CheckInterrupted { source },
        };
        self.observer.on_event(&event);
    }
}
