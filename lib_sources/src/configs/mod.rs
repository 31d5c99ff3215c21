//! # Configuration Modules
//!
//! This module aggregates the poller's configuration: the typed settings with
//! their defaults, and (behind the `configs` feature) layered loading of those
//! settings from JSON files.

/// Typed poller settings, defaults and validation.
pub mod config_poller;

/// Layered JSON configuration loading.
#[cfg(feature = "configs")]
pub mod config_layered;
