#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use lib_sources::{
    ContentType, ContentTypesCheck, ContentTypesPoller, PollerConfig, RecordingObserver, Source,
    SourceError, SourceKey, StatusCheck, StatusSourcePoller, WorkerPool,
};

/// What the next probe of a [`ScriptedSource`] does.
#[derive(Debug, Clone)]
pub enum Behavior {
    Up,
    Down,
    Fail(&'static str),
    Panic,
    Hang,
    /// Sleeps, then reports the given availability.
    Slow(Duration, bool),
}

#[derive(Default)]
struct Counters {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    dropped: AtomicUsize,
}

/// Increments `dropped` if a probe is dropped before it returns.
struct ProbeGuard<'a> {
    counters: &'a Counters,
    finished: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        if !self.finished {
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A source whose probe result is set by the test.
pub struct ScriptedSource {
    id: String,
    version: Option<String>,
    behavior: Mutex<Behavior>,
    content_types: Mutex<Option<Vec<ContentType>>>,
    invalidated: AtomicBool,
    counters: Counters,
}

impl ScriptedSource {
    pub fn new(id: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            version: None,
            behavior: Mutex::new(behavior),
            content_types: Mutex::new(None),
            invalidated: AtomicBool::new(false),
            counters: Counters::default(),
        })
    }

    pub fn versioned(id: &str, version: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            version: Some(version.to_string()),
            behavior: Mutex::new(behavior),
            content_types: Mutex::new(None),
            invalidated: AtomicBool::new(false),
            counters: Counters::default(),
        })
    }

    pub fn set(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn set_content_types(&self, types: Vec<ContentType>) {
        *self.content_types.lock() = Some(types);
    }

    /// Makes every descriptor accessor fail from now on.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    /// Probes that were dropped before returning.
    pub fn dropped(&self) -> usize {
        self.counters.dropped.load(Ordering::SeqCst)
    }

    pub fn key(&self) -> SourceKey {
        SourceKey::of(self)
    }

    pub fn handle(self: &Arc<Self>) -> Arc<dyn Source> {
        Arc::clone(self) as Arc<dyn Source>
    }

    fn enter(&self) -> ProbeGuard<'_> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        ProbeGuard {
            counters: &self.counters,
            finished: false,
        }
    }
}

#[async_trait]
impl Source for ScriptedSource {
    fn id(&self) -> Result<String, SourceError> {
        if self.invalidated.load(Ordering::SeqCst) {
            return Err(SourceError::Invalidated);
        }
        Ok(self.id.clone())
    }

    fn version(&self) -> Result<Option<String>, SourceError> {
        if self.invalidated.load(Ordering::SeqCst) {
            return Err(SourceError::Invalidated);
        }
        Ok(self.version.clone())
    }

    async fn is_available(&self) -> Result<bool, SourceError> {
        let mut guard = self.enter();
        let behavior = self.behavior.lock().clone();
        let result = match behavior {
            Behavior::Up => Ok(true),
            Behavior::Down => Ok(false),
            Behavior::Fail(reason) => Err(SourceError::Probe(reason.to_string())),
            Behavior::Panic => panic!("probe blew up"),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Ok(false)
            }
            Behavior::Slow(delay, available) => {
                tokio::time::sleep(delay).await;
                Ok(available)
            }
        };
        guard.finished = true;
        result
    }

    async fn content_types(&self) -> Result<Vec<ContentType>, SourceError> {
        let mut guard = self.enter();
        let behavior = self.behavior.lock().clone();
        let result = match behavior {
            Behavior::Fail(reason) => Err(SourceError::Probe(reason.to_string())),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
            Behavior::Slow(delay, _) => {
                tokio::time::sleep(delay).await;
                self.listed_types()
            }
            _ => self.listed_types(),
        };
        guard.finished = true;
        result
    }
}

impl ScriptedSource {
    fn listed_types(&self) -> Result<Vec<ContentType>, SourceError> {
        self.content_types
            .lock()
            .clone()
            .ok_or(SourceError::Unsupported("content types"))
    }
}

/// A config with a short timeout and no recheck throttling.
pub fn fast_config() -> PollerConfig {
    PollerConfig {
        interval_secs: 60,
        initial_delay_secs: 0,
        check_timeout_ms: 100,
        min_recheck_secs: 0,
        max_concurrent_checks: 8,
    }
}

pub fn status_runner(config: PollerConfig) -> (StatusSourcePoller, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::new());
    let pool = WorkerPool::on_current_runtime(config.max_concurrent_checks).expect("pool");
    let runner =
        StatusSourcePoller::new(StatusCheck, config, pool, observer.clone()).expect("runner");
    (runner, observer)
}

pub fn content_types_runner(config: PollerConfig) -> (ContentTypesPoller, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::new());
    let pool = WorkerPool::on_current_runtime(config.max_concurrent_checks).expect("pool");
    let runner =
        ContentTypesPoller::new(ContentTypesCheck, config, pool, observer.clone()).expect("runner");
    (runner, observer)
}

/// Waits until `condition` holds.
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never held");
}
