//! # Probes
//!
//! Ready-made [`Source`](crate::sources::Source) implementations for the two
//! most common liveness checks.
//!
//! - **`tcp`**: a source is up if a TCP connection to it can be opened.
//! - **`http`**: a source is up if a `GET` on its URL returns a 2xx status.
//!
//! Neither probe applies its own deadline; the poller's check timeout is what
//! turns a hung connect into `TIMEOUT`.

/// TCP connect probe.
pub mod tcp;
/// HTTP `GET` probe.
pub mod http;

pub use http::HttpSource;
pub use tcp::TcpSource;
