//! # Poll Observer
//!
//! Every component is handed an observer at construction instead of logging
//! through a process-wide singleton. Production code plugs in [`LogObserver`];
//! tests plug in [`RecordingObserver`] and assert on what happened.

use std::time::Duration;

use parking_lot::Mutex;

/// # Poll Event
///
/// Everything worth logging that the poller and runner do.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A source was added to the live set.
    SourceBound {
        /// The source's key, rendered.
        source: String,
    },
    /// A source was removed from the live set.
    SourceUnbound {
        /// The source's key, rendered.
        source: String,
    },
    /// A scheduled poll cycle began.
    CycleStarted {
        /// How many sources the cycle will visit.
        sources: usize,
    },
    /// A check was not started because one is already running for the key.
    CheckSkipped {
        /// The source's key, rendered.
        source: String,
    },
    /// An on-demand recheck was refused because the last attempt is too recent.
    RecheckThrottled {
        /// The source's key, rendered.
        source: String,
    },
    /// A probe returned within the timeout.
    CheckCompleted {
        /// The source's key, rendered.
        source: String,
        /// The check kind's label.
        check: &'static str,
        /// The published value, rendered with `Debug`.
        value: String,
        /// How long the probe took.
        elapsed: Duration,
    },
    /// A probe exceeded the timeout and was aborted.
    CheckTimedOut {
        /// The source's key, rendered.
        source: String,
        /// The check kind's label.
        check: &'static str,
        /// The bound that was exceeded.
        timeout: Duration,
    },
    /// A probe returned an error or panicked.
    CheckFailed {
        /// The source's key, rendered.
        source: String,
        /// The check kind's label.
        check: &'static str,
        /// The rendered failure.
        error: String,
    },
    /// The probe task was cancelled from outside before it finished.
    CheckCancelled {
        /// The source's key, rendered.
        source: String,
    },
    /// The check was interrupted by shutdown before it could publish.
    CheckInterrupted {
        /// The source's key, rendered.
        source: String,
    },
    /// A finished check's value was dropped because its slot was gone or
    /// had been replaced.
    ResultDiscarded {
        /// The source's key, rendered.
        source: String,
    },
    /// The runner stopped its schedule and worker pool.
    RunnerShutDown,
}

/// # Poll Observer
///
/// A sink for [`PollEvent`]s. Called from scheduler and worker tasks, so it
/// must be cheap and must not block.
pub trait PollObserver: Send + Sync {
    /// Receives one event.
    fn on_event(&self, event: &PollEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl PollObserver for LogObserver {
    fn on_event(&self, event: &PollEvent) {
        match event {
            PollEvent::SourceBound { source } => log::info!("Source '{}' bound", source),
            PollEvent::SourceUnbound { source } => log::info!("Source '{}' unbound", source),
            PollEvent::CycleStarted { sources } => {
                log::debug!("Poll cycle started for {} source(s)", sources)
            }
            PollEvent::CheckSkipped { source } => {
                log::debug!("Check for '{}' still running, skipping", source)
            }
            PollEvent::RecheckThrottled { source } => {
                log::debug!("Recheck for '{}' refused, last attempt too recent", source)
            }
            PollEvent::CheckCompleted { source, check, value, elapsed } => log::debug!(
                "{} check for '{}' completed in {:?}: {}",
                check,
                source,
                elapsed,
                value
            ),
            PollEvent::CheckTimedOut { source, check, timeout } => log::warn!(
                "{} check for '{}' timed out after {:?}",
                check,
                source,
                timeout
            ),
            PollEvent::CheckFailed { source, check, error } => {
                log::warn!("{} check for '{}' failed: {}", check, source, error)
            }
            PollEvent::CheckCancelled { source } => {
                log::debug!("Check for '{}' was cancelled", source)
            }
            PollEvent::CheckInterrupted { source } => {
                log::debug!("Check for '{}' interrupted by shutdown", source)
            }
            PollEvent::ResultDiscarded { source } => {
                log::debug!("Result for '{}' discarded, source no longer bound", source)
            }
            PollEvent::RunnerShutDown => log::info!("Poller runner shut down"),
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PollEvent>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything recorded so far.
    pub fn events(&self) -> Vec<PollEvent> {
        self.events.lock().clone()
    }

    /// Counts recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&PollEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl PollObserver for RecordingObserver {
    fn on_event(&self, event: &PollEvent) {
        self.events.lock().push(event.clone());
    }
}
