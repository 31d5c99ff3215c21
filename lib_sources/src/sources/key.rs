//! # Source Key
//!
//! The map key under which a source's cache entry and lock live. It is captured
//! from the source's descriptive fields; a field that cannot be read at capture
//! time is stored as absent.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sources::Source;

/// # Source Key
///
/// Two keys are equal iff every captured field is equal. Ordering compares
/// fields in declaration order with absent values sorting last, so a key whose
/// handle went bad still has a well-defined place in any ordered listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceKey {
    id: Option<String>,
    title: Option<String>,
    version: Option<String>,
    description: Option<String>,
    organization: Option<String>,
}

impl SourceKey {
    /// Reads the descriptive fields from `source`. Any accessor that errors is
    /// treated as absent.
    pub fn of(source: &dyn Source) -> Self {
        Self {
            id: source.id().ok(),
            title: source.title().ok().flatten(),
            version: source.version().ok().flatten(),
            description: source.description().ok().flatten(),
            organization: source.organization().ok().flatten(),
        }
    }

    /// Builds a key from an identifier alone.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            title: None,
            version: None,
            description: None,
            organization: None,
        }
    }

    /// The captured identifier, if it was readable.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The captured title.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The captured version.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The captured description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The captured organization.
    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    /// True when no field could be read at all.
    pub fn is_blank(&self) -> bool {
        self.id.is_none()
            && self.title.is_none()
            && self.version.is_none()
            && self.description.is_none()
            && self.organization.is_none()
    }
}

/// Compares two optional fields with `None` after every `Some`.
fn nulls_last(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl Ord for SourceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        nulls_last(&self.id, &other.id)
            .then_with(|| nulls_last(&self.title, &other.title))
            .then_with(|| nulls_last(&self.version, &other.version))
            .then_with(|| nulls_last(&self.description, &other.description))
            .then_with(|| nulls_last(&self.organization, &other.organization))
    }
}

impl PartialOrd for SourceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.id, &self.version) {
            (Some(id), Some(version)) => write!(f, "{}@{}", id, version),
            (Some(id), None) => write!(f, "{}", id),
            (None, _) => write!(f, "<unreadable source>"),
        }
    }
}
