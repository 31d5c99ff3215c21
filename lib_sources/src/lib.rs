//! # lib_sources
//!
//! Availability polling for a dynamic set of remote data sources.
//!
//! A [`PollerRunner`](core::runner::PollerRunner) owns the live set of bound
//! sources and drives a generic [`Poller`](core::poller::Poller) on a fixed
//! interval. Each check is bounded by a timeout, de-duplicated per source and
//! published into a concurrent cache that callers read without ever waiting on
//! the poll cycle. Nothing a misbehaving source does (returning an error,
//! panicking, hanging) escapes the engine; every failure mode becomes a cached
//! status instead.
//!
//! Optional modules are gated the same way across the workspace:
//! `configs` (layered JSON configuration), `loggers` (host logging setup) and
//! `probes` (ready-made TCP/HTTP sources).

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// The polling engine: registry, worker pool, poller and runner.
pub mod core;
/// Library-level error types.
pub mod errors;
/// Request locality defaults and availability-aware target selection.
pub mod routing;
/// The `Source` abstraction and the status/content-type specializations.
pub mod sources;

/// Poller configuration and layered configuration loading.
pub mod configs;

/// Logging setup for host processes.
#[cfg(feature = "loggers")]
pub mod loggers;

/// Ready-made TCP and HTTP sources.
#[cfg(feature = "probes")]
pub mod probes;

// --- Public API Re-exports ---
pub use crate::configs::config_poller::PollerConfig;
pub use crate::core::observer::{LogObserver, PollEvent, PollObserver, RecordingObserver};
pub use crate::core::poller::{Dispatch, Poller};
pub use crate::core::registry::Cached;
pub use crate::core::runner::PollerRunner;
pub use crate::core::workers::WorkerPool;
pub use crate::errors::PollerError;
pub use crate::sources::content_types::{ContentType, ContentTypesCheck, ContentTypesPoller};
pub use crate::sources::key::SourceKey;
pub use crate::sources::status::{CachedAvailability, SourceStatus, StatusCheck, StatusSourcePoller};
pub use crate::sources::{Source, SourceError};
