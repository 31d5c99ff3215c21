//! # Source Status
//!
//! The liveness specialization of the engine. A probe's boolean becomes
//! `Available` or `Unavailable`; a hung probe becomes `Timeout` and a failing
//! one `Exception`. Those are different operational conditions: a source that
//! answers "down" is reachable, one that never answers is not, and one whose
//! probe blows up needs someone to look at it.
//!
//! ## Transitions for one source:
//! - No cache entry reads as `Unknown` (never checked, or not bound).
//! - Every completed check overwrites the previous status, whatever it was.
//! - A skipped, cancelled or interrupted check changes nothing.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::core::check::{CheckFailure, CheckKind, SourceCheck};
use crate::core::registry::Cached;
use crate::core::runner::PollerRunner;
use crate::sources::key::SourceKey;
use crate::sources::Source;

/// # Source Status
///
/// The five states a source can be reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceStatus {
    /// The probe reported the source up.
    Available,
    /// The probe reported the source down.
    Unavailable,
    /// No check has completed for the source.
    Unknown,
    /// The probe failed with an error or panic.
    Exception,
    /// The probe did not finish within the timeout.
    Timeout,
}

impl SourceStatus {
    /// True only for [`SourceStatus::Available`].
    pub fn is_available(self) -> bool {
        self == SourceStatus::Available
    }

    /// The upper-case name used in logs and serialized output.
    pub fn as_str(self) -> &'static str {
        match self {
            SourceStatus::Available => "AVAILABLE",
            SourceStatus::Unavailable => "UNAVAILABLE",
            SourceStatus::Unknown => "UNKNOWN",
            SourceStatus::Exception => "EXCEPTION",
            SourceStatus::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The cached status of one source and when it was recorded.
pub type CachedAvailability = Cached<SourceStatus>;

impl Cached<SourceStatus> {
    /// The recorded status.
    pub fn status(&self) -> SourceStatus {
        *self.value()
    }

    /// When the check that produced the status completed.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.checked_at()
    }
}

/// The liveness check.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusCheck;

impl CheckKind for StatusCheck {
    type Output = bool;
    type Value = SourceStatus;

    fn name(&self) -> &'static str {
        "status"
    }

    fn on_value(&self, available: bool) -> SourceStatus {
        if available {
            SourceStatus::Available
        } else {
            SourceStatus::Unavailable
        }
    }

    fn on_timeout(&self) -> SourceStatus {
        SourceStatus::Timeout
    }

    fn on_failure(&self, _failure: &CheckFailure) -> SourceStatus {
        SourceStatus::Exception
    }
}

impl SourceCheck for StatusCheck {
    fn probe(&self, source: Arc<dyn Source>) -> BoxFuture<'static, anyhow::Result<bool>> {
        Box::pin(async move { Ok(source.is_available().await?) })
    }
}

/// A runner polling source liveness.
pub type StatusSourcePoller = PollerRunner<StatusCheck>;

impl PollerRunner<StatusCheck> {
    /// The cached status of `source`; `Unknown` if it has none.
    pub fn get_status(&self, source: &dyn Source) -> SourceStatus {
        self.get_cached_source(source)
            .map(|cached| cached.status())
            .unwrap_or(SourceStatus::Unknown)
    }

    /// The cached status under `key`; `Unknown` if there is none.
    pub fn status_of(&self, key: &SourceKey) -> SourceStatus {
        self.get_cached(key)
            .map(|cached| cached.status())
            .unwrap_or(SourceStatus::Unknown)
    }

    /// True if the last completed check found `source` available.
    pub fn is_available(&self, source: &dyn Source) -> bool {
        self.get_status(source).is_available()
    }
}
