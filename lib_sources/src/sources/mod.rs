//! # Sources
//!
//! A source is anything whose liveness is tracked: it carries a handful of
//! descriptive fields (used to derive its [`SourceKey`](key::SourceKey)) and a
//! probe that may succeed, fail or hang.
//!
//! ## Contained Modules:
//! - **`key`**: the stable, null-tolerant identity derived from a source.
//! - **`status`**: the liveness specialization (`SourceStatus`).
//! - **`content_types`**: the content-type enumeration specialization.
//!
//! Descriptor accessors are fallible on purpose. A source handle handed to the
//! runner may stop being usable between bind and a later comparison (a remote
//! proxy torn down, a connection dropped); key derivation treats any field it
//! cannot read as absent instead of failing.

use async_trait::async_trait;
use thiserror::Error;

use crate::sources::content_types::ContentType;

/// The stable identity derived from a source's descriptive fields.
pub mod key;
/// The liveness check and its five-state status.
pub mod status;
/// The content-type enumeration check.
pub mod content_types;

/// # Source Error
///
/// Failures a source may report from its descriptor accessors or probes.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The probe ran and failed.
    #[error("Probe failed: {0}")]
    Probe(String),

    /// The handle no longer refers to a usable source.
    #[error("Source handle is no longer valid")]
    Invalidated,

    /// The source does not expose this field or operation.
    #[error("Not supported by this source: {0}")]
    Unsupported(&'static str),

    /// An I/O error occurred while probing.
    #[error("I/O error occurred: {0}")]
    Io(#[from] std::io::Error),
}

/// # Source
///
/// A remote or local system whose availability is polled.
///
/// Implementations must tolerate being probed from any worker thread and being
/// dropped mid-probe: when a check times out or the runner shuts down, the
/// probe's future is aborted at its next suspension point.
#[async_trait]
pub trait Source: Send + Sync {
    /// The source identifier. This is the primary component of the key.
    fn id(&self) -> Result<String, SourceError>;

    /// A human-readable title.
    fn title(&self) -> Result<Option<String>, SourceError> {
        Ok(None)
    }

    /// The version of the software behind the source.
    fn version(&self) -> Result<Option<String>, SourceError> {
        Ok(None)
    }

    /// A longer description.
    fn description(&self) -> Result<Option<String>, SourceError> {
        Ok(None)
    }

    /// The organization operating the source.
    fn organization(&self) -> Result<Option<String>, SourceError> {
        Ok(None)
    }

    /// Probes the source. `Ok(true)` means up, `Ok(false)` means the source
    /// actively reports itself down.
    async fn is_available(&self) -> Result<bool, SourceError>;

    /// Lists the content types this source offers.
    async fn content_types(&self) -> Result<Vec<ContentType>, SourceError> {
        Err(SourceError::Unsupported("content types"))
    }
}
