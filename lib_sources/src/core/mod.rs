//! # Core Engine Module
//!
//! The polling engine, split the way responsibilities split at runtime:
//!
//! - **`registry`**: the shared `key -> slot` map. Each slot holds the last
//!   published value, the per-key check lock and bookkeeping (slot generation,
//!   last dispatch time). Readers never wait on a running check.
//!
//! - **`check`**: the `CheckKind` seam. A specialization only says how a probe
//!   result, a timeout or a failure becomes a cached value.
//!
//! - **`workers`**: the explicitly owned, bounded worker pool and its shutdown
//!   token.
//!
//! - **`poller`**: runs one bounded, de-duplicated check per key and publishes
//!   the outcome. Never lets a probe failure escape.
//!
//! - **`runner`**: owns the live set of sources and drives the poller on an
//!   interval, on bind, and on demand.
//!
//! - **`observer`**: the injected event sink used instead of a global logger.

/// Specialization seam between the engine and what a check means.
pub mod check;
/// Event sink injected into every component.
pub mod observer;
/// Runs bounded, de-duplicated checks and publishes their outcome.
pub mod poller;
/// Shared cache entries and per-key locks.
pub mod registry;
/// Dynamic source set and scheduling.
pub mod runner;
/// The bounded, explicitly owned worker pool.
pub mod workers;

// --- Public API Re-exports ---
pub use check::{CheckFailure, CheckKind, CheckOutcome, SourceCheck};
pub use observer::{LogObserver, PollEvent, PollObserver, RecordingObserver};
pub use poller::{CheckHandle, Dispatch, Poller};
pub use registry::{Cached, Registry};
pub use runner::PollerRunner;
pub use workers::WorkerPool;
