//! # Poller Errors
//!
//! Errors surfaced by the library's own API: building a runner, loading or
//! validating configuration, and lifecycle misuse. Probe failures never show up
//! here; those are converted into cached statuses by the engine.

use thiserror::Error;

/// # Poller Error
///
/// The error type returned by constructors, configuration loading and
/// lifecycle operations.
#[derive(Debug, Error)]
pub enum PollerError {
    /// No tokio runtime was available to host the worker pool.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// A configuration value failed validation.
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        /// The configuration key or field name.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Configuration files could not be loaded.
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    /// An I/O error occurred, typically while reading configuration or log files.
    #[error("I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),

    /// A global logger was already installed.
    #[cfg(feature = "loggers")]
    #[error("Failed to install logger: {0}")]
    Logger(#[from] log::SetLoggerError),

    /// The runner was already shut down and cannot be started again.
    #[error("Runner has been shut down")]
    ShutDown,
}
