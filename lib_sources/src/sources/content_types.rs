//! # Content Types
//!
//! A second specialization sharing the same engine: instead of "is it up", it
//! caches which content types each source currently offers. A source that
//! times out or fails offers nothing reachable, so both publish an empty list.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::core::check::{CheckFailure, CheckKind, SourceCheck};
use crate::core::runner::PollerRunner;
use crate::sources::Source;

/// # Content Type
///
/// A named kind of record a source can return, optionally versioned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentType {
    /// The content type name.
    pub name: String,
    /// The content type version, if the source distinguishes versions.
    pub version: Option<String>,
}

impl ContentType {
    /// Creates an unversioned content type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Creates a versioned content type.
    pub fn versioned(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} ({})", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// The content-type enumeration check.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentTypesCheck;

impl CheckKind for ContentTypesCheck {
    type Output = Vec<ContentType>;
    type Value = Vec<ContentType>;

    fn name(&self) -> &'static str {
        "content-types"
    }

    fn on_value(&self, mut types: Vec<ContentType>) -> Vec<ContentType> {
        types.sort();
        types.dedup();
        types
    }

    fn on_timeout(&self) -> Vec<ContentType> {
        Vec::new()
    }

    fn on_failure(&self, _failure: &CheckFailure) -> Vec<ContentType> {
        Vec::new()
    }
}

impl SourceCheck for ContentTypesCheck {
    fn probe(&self, source: Arc<dyn Source>) -> BoxFuture<'static, anyhow::Result<Vec<ContentType>>> {
        Box::pin(async move { Ok(source.content_types().await?) })
    }
}

/// A runner polling the content types each source offers.
pub type ContentTypesPoller = PollerRunner<ContentTypesCheck>;

impl PollerRunner<ContentTypesCheck> {
    /// The cached content types of `source`; empty if none are cached.
    pub fn content_types(&self, source: &dyn Source) -> Vec<ContentType> {
        self.get_cached_source(source)
            .map(|cached| cached.into_value())
            .unwrap_or_default()
    }

    /// The union of every bound source's cached content types.
    pub fn all_content_types(&self) -> BTreeSet<ContentType> {
        self.snapshot()
            .into_iter()
            .filter_map(|(_, cached)| cached)
            .flat_map(|cached| cached.into_value())
            .collect()
    }
}
