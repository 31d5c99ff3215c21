//! # Check Kinds
//!
//! The seam between the generic engine and what a check actually means. The
//! engine owns locking, timeouts and publication; a [`CheckKind`] only says how
//! a raw probe result, a timeout or a failure maps to the cached value.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::sources::Source;

/// # Check Kind
///
/// Maps the outcome of one bounded check to the value published in the cache.
pub trait CheckKind: Send + Sync + 'static {
    /// What the probe returns on success.
    type Output: Send + 'static;
    /// What the cache stores.
    type Value: Clone + fmt::Debug + Send + Sync + 'static;

    /// A short label used in log events.
    fn name(&self) -> &'static str;

    /// Classifies a probe result that arrived within the timeout.
    fn on_value(&self, output: Self::Output) -> Self::Value;

    /// The value recorded when the probe exceeded the timeout.
    fn on_timeout(&self) -> Self::Value;

    /// The value recorded when the probe returned an error or panicked.
    fn on_failure(&self, failure: &CheckFailure) -> Self::Value;
}

/// # Source Check
///
/// A [`CheckKind`] that knows how to build its probe from a [`Source`]. This is
/// what the runner needs; the engine itself takes the probe as a future.
pub trait SourceCheck: CheckKind {
    /// Builds the probe future for `source`.
    fn probe(&self, source: Arc<dyn Source>) -> BoxFuture<'static, anyhow::Result<Self::Output>>;
}

/// Why a probe did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckFailure {
    /// The probe returned an error.
    Error(String),
    /// The probe panicked.
    Panicked(String),
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckFailure::Error(msg) => write!(f, "probe error: {}", msg),
            CheckFailure::Panicked(msg) => write!(f, "probe panicked: {}", msg),
        }
    }
}

/// # Check Outcome
///
/// How one dispatched check ended. Only the first three variants replace the
/// cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome<V> {
    /// The probe returned within the timeout.
    Completed(V),
    /// The probe exceeded the timeout and was aborted.
    TimedOut(V),
    /// The probe returned an error or panicked.
    Failed {
        /// The value recorded for the failure.
        value: V,
        /// What went wrong.
        failure: CheckFailure,
    },
    /// The probe task was cancelled from outside before it finished.
    Cancelled,
    /// The check itself was interrupted by shutdown.
    Interrupted,
}

impl<V> CheckOutcome<V> {
    /// The value this outcome records, if any.
    pub fn value(&self) -> Option<&V> {
        match self {
            CheckOutcome::Completed(v) | CheckOutcome::TimedOut(v) => Some(v),
            CheckOutcome::Failed { value, .. } => Some(value),
            CheckOutcome::Cancelled | CheckOutcome::Interrupted => None,
        }
    }
}

/// Renders a panic payload the way `std` prints it.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send + 'static>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
