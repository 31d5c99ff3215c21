//! # Poller Runner
//!
//! Owns the live set of sources and drives the [`Poller`] over it: once per
//! interval for every bound source, immediately for a newly bound one, and on
//! demand through a throttled recheck.
//!
//! The runner decides *what* to check; the poller decides *how* one check is
//! bounded, de-duplicated and published. Both specializations in this crate
//! (status and content types) share this runner unchanged.
//!
//! Each bound source is stored together with the key captured at bind time, so
//! a poll cycle never has to re-read descriptor fields from a handle that may
//! have gone bad since.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::configs::config_poller::PollerConfig;
use crate::core::check::{CheckOutcome, SourceCheck};
use crate::core::observer::{LogObserver, PollEvent, PollObserver};
use crate::core::poller::{Dispatch, Poller};
use crate::core::registry::{Cached, Registry};
use crate::core::workers::WorkerPool;
use crate::errors::PollerError;
use crate::sources::key::SourceKey;
use crate::sources::Source;

/// How long `shutdown` waits for in-flight tasks to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

struct BoundSource {
    key: SourceKey,
    source: Arc<dyn Source>,
}

struct Shared<C: SourceCheck> {
    poller: Poller<SourceKey, C>,
    registry: Arc<Registry<SourceKey, C::Value>>,
    sources: RwLock<Vec<BoundSource>>,
    pool: WorkerPool,
    config: PollerConfig,
    observer: Arc<dyn PollObserver>,
}

impl<C: SourceCheck> Shared<C> {
    fn run(&self) -> Vec<Dispatch<C::Value>> {
        let snapshot: Vec<(SourceKey, Arc<dyn Source>)> = self
            .sources
            .read()
            .iter()
            .map(|bound| (bound.key.clone(), Arc::clone(&bound.source)))
            .collect();

        self.observer.on_event(&PollEvent::CycleStarted { sources: snapshot.len() });

        snapshot
            .into_iter()
            .map(|(key, source)| {
                let probe = self.poller.kind().probe(source);
                self.poller.check_status(&key, probe)
            })
            .collect()
    }

    /// Finds the bound entry for `source`, by key first and by handle identity
    /// if the handle's fields can no longer be read.
    fn find(&self, source: &dyn Source) -> Option<(SourceKey, Arc<dyn Source>)> {
        let key = SourceKey::of(source);
        self.sources
            .read()
            .iter()
            .find(|bound| is_same(bound, &key, source))
            .map(|bound| (bound.key.clone(), Arc::clone(&bound.source)))
    }

    /// The key `source` was bound under, if it is bound.
    fn bound_key(&self, source: &dyn Source) -> Option<SourceKey> {
        self.find(source).map(|(key, _)| key)
    }
}

fn is_same(bound: &BoundSource, key: &SourceKey, source: &dyn Source) -> bool {
    bound.key == *key || std::ptr::addr_eq(Arc::as_ptr(&bound.source), source)
}

/// # Poller Runner
///
/// The registry and scheduler for one kind of check.
///
/// The runner takes ownership of the [`WorkerPool`] it is given: shutting the
/// runner down, or dropping it, shuts the pool down.
pub struct PollerRunner<C: SourceCheck> {
    shared: Arc<Shared<C>>,
    schedule: Mutex<Option<JoinHandle<()>>>,
}

impl<C: SourceCheck> PollerRunner<C> {
    /// Creates a runner for `kind` using an explicitly built pool and observer.
    pub fn new(
        kind: C,
        config: PollerConfig,
        pool: WorkerPool,
        observer: Arc<dyn PollObserver>,
    ) -> Result<Self, PollerError> {
        config.validate()?;

        let registry = Arc::new(Registry::new());
        let poller = Poller::new(
            kind,
            Arc::clone(&registry),
            pool.clone(),
            config.check_timeout(),
            Arc::clone(&observer),
        );

        Ok(Self {
            shared: Arc::new(Shared {
                poller,
                registry,
                sources: RwLock::new(Vec::new()),
                pool,
                config,
                observer,
            }),
            schedule: Mutex::new(None),
        })
    }

    /// Creates a runner on the caller's tokio runtime, logging through `log`.
    pub fn on_current_runtime(kind: C, config: PollerConfig) -> Result<Self, PollerError> {
        let pool = WorkerPool::on_current_runtime(config.max_concurrent_checks)?;
        Self::new(kind, config, pool, Arc::new(LogObserver))
    }

    /// # Bind
    ///
    /// Adds `source` to the live set and starts its first check right away.
    ///
    /// Returns `false`, changing nothing, if a source with the same key is
    /// already bound.
    pub fn bind(&self, source: Arc<dyn Source>) -> bool {
        let key = SourceKey::of(source.as_ref());
        {
            let mut sources = self.shared.sources.write();
            if sources.iter().any(|bound| bound.key == key) {
                log::debug!("Source '{}' is already bound", key);
                return false;
            }
            self.shared.registry.register(key.clone());
            sources.push(BoundSource {
                key: key.clone(),
                source: Arc::clone(&source),
            });
        }

        self.shared.observer.on_event(&PollEvent::SourceBound { source: key.to_string() });

        let probe = self.shared.poller.kind().probe(source);
        self.shared.poller.check_status(&key, probe);
        true
    }

    /// # Unbind
    ///
    /// Removes `source` from the live set along with its cache entry and lock.
    /// A check still running for it finishes without publishing.
    pub fn unbind(&self, source: &Arc<dyn Source>) -> bool {
        let key = SourceKey::of(source.as_ref());
        let removed = {
            let mut sources = self.shared.sources.write();
            let position = sources
                .iter()
                .position(|bound| is_same(bound, &key, source.as_ref()));
            position.map(|index| {
                let bound = sources.remove(index);
                self.shared.registry.deregister(&bound.key);
                bound.key
            })
        };

        match removed {
            Some(key) => {
                self.shared.observer.on_event(&PollEvent::SourceUnbound { source: key.to_string() });
                true
            }
            None => false,
        }
    }

    /// Removes the source bound under `key`.
    pub fn unbind_key(&self, key: &SourceKey) -> bool {
        let removed = {
            let mut sources = self.shared.sources.write();
            let before = sources.len();
            sources.retain(|bound| &bound.key != key);
            self.shared.registry.deregister(key);
            sources.len() != before
        };
        if removed {
            self.shared.observer.on_event(&PollEvent::SourceUnbound { source: key.to_string() });
        }
        removed
    }

    /// # Run
    ///
    /// One poll cycle: dispatches a check for every bound source. Sources with
    /// a check still in flight are skipped. Returns one [`Dispatch`] per source,
    /// in bind order.
    pub fn run(&self) -> Vec<Dispatch<C::Value>> {
        self.shared.run()
    }

    /// Runs one cycle and waits for every check it started.
    pub async fn poll_now(&self) -> Vec<CheckOutcome<C::Value>> {
        let mut outcomes = Vec::new();
        for dispatch in self.run() {
            if let Dispatch::Started(handle) = dispatch {
                if let Some(outcome) = handle.wait().await {
                    outcomes.push(outcome);
                }
            }
        }
        outcomes
    }

    /// # Recheck Availability
    ///
    /// Checks one bound source now, unless a check is already running or the
    /// last one was dispatched less than `min_recheck_interval` ago.
    pub fn recheck_availability(&self, source: &Arc<dyn Source>) -> Dispatch<C::Value> {
        let Some((key, bound)) = self.shared.find(source.as_ref()) else {
            return Dispatch::Unknown;
        };
        let probe = self.shared.poller.kind().probe(bound);
        self.shared
            .poller
            .check_status_throttled(&key, self.shared.config.min_recheck_interval(), probe)
    }

    /// # Start
    ///
    /// Begins the fixed-interval schedule. The first cycle runs after the
    /// configured initial delay. Calling `start` on a running runner is a no-op.
    pub fn start(&self) -> Result<(), PollerError> {
        let mut schedule = self.schedule.lock();
        if schedule.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let task = async move {
            let first = Instant::now() + shared.config.initial_delay();
            let mut ticker = tokio::time::interval_at(first, shared.config.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let token = shared.pool.shutdown_token().clone();

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        shared.run();
                    }
                }
            }
        };

        let handle = self.shared.pool.spawn(task).ok_or(PollerError::ShutDown)?;
        *schedule = Some(handle);
        log::info!(
            "Poller runner started: every {:?}, timeout {:?}",
            self.shared.config.interval(),
            self.shared.config.check_timeout()
        );
        Ok(())
    }

    /// # Shutdown
    ///
    /// Stops the schedule, interrupts every in-flight check and waits briefly
    /// for the pool to drain. Results that arrive afterwards are discarded.
    /// Returns `true` if everything drained in time.
    pub async fn shutdown(&self) -> bool {
        if let Some(handle) = self.schedule.lock().take() {
            handle.abort();
        }
        let drained = self.shared.pool.shutdown(SHUTDOWN_GRACE).await;
        self.shared.observer.on_event(&PollEvent::RunnerShutDown);
        drained
    }

    /// True once the runner has been shut down.
    pub fn is_shut_down(&self) -> bool {
        self.shared.pool.is_shut_down()
    }

    /// The cached entry for `source`, read without waiting on any check.
    /// A bound handle whose fields can no longer be read still finds its entry.
    pub fn get_cached_source(&self, source: &dyn Source) -> Option<Cached<C::Value>> {
        let key = self.shared.bound_key(source)?;
        self.shared.registry.cached(&key)
    }

    /// The cached entry for `key`.
    pub fn get_cached(&self, key: &SourceKey) -> Option<Cached<C::Value>> {
        self.shared.registry.cached(key)
    }

    /// When a check was last dispatched for `source`. Unlike the cached
    /// entry's timestamp, this moves as soon as a check starts.
    pub fn last_attempt(&self, source: &dyn Source) -> Option<Instant> {
        let key = self.shared.bound_key(source)?;
        self.shared.registry.last_attempt(&key)
    }

    /// True if `source` is bound.
    pub fn is_bound(&self, source: &Arc<dyn Source>) -> bool {
        self.shared.find(source.as_ref()).is_some()
    }

    /// Every bound source with its key, in bind order.
    pub fn bound(&self) -> Vec<(SourceKey, Arc<dyn Source>)> {
        self.shared
            .sources
            .read()
            .iter()
            .map(|bound| (bound.key.clone(), Arc::clone(&bound.source)))
            .collect()
    }

    /// Every bound key with its cached entry, in bind order.
    pub fn snapshot(&self) -> Vec<(SourceKey, Option<Cached<C::Value>>)> {
        self.shared
            .sources
            .read()
            .iter()
            .map(|bound| (bound.key.clone(), self.shared.registry.cached(&bound.key)))
            .collect()
    }

    /// Number of bound sources.
    pub fn len(&self) -> usize {
        self.shared.sources.read().len()
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The registry behind this runner.
    pub fn registry(&self) -> &Arc<Registry<SourceKey, C::Value>> {
        &self.shared.registry
    }

    /// The configuration the runner was built with.
    pub fn config(&self) -> &PollerConfig {
        &self.shared.config
    }
}

impl<C: SourceCheck> Drop for PollerRunner<C> {
    fn drop(&mut self) {
        if let Some(handle) = self.schedule.get_mut().take() {
            handle.abort();
        }
        self.shared.pool.shutdown_token().cancel();
    }
}
