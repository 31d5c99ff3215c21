//! # Request Routing
//!
//! The consumer side of the status cache: deciding, for an incoming query,
//! whether the local catalog takes part and which remote sources to fan out to.
//! Routing only ever reads cached statuses; it never triggers a check.
//!
//! The defaults are literal: a request without properties is local, and a
//! request that does not say it is enterprise-wide is not.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sources::status::StatusSourcePoller;
use crate::sources::Source;

/// Property naming a request as destined for remote sources.
pub const REMOTE_DESTINATION_KEY: &str = "remote-destination";

/// # Request
///
/// The routing-relevant part of a catalog query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Free-form request properties. `None` when the caller sent none at all.
    pub properties: Option<HashMap<String, Value>>,
    /// Whether the query targets every known source.
    pub enterprise: Option<bool>,
    /// Identifiers of the sources the query names explicitly.
    pub source_ids: Vec<String>,
}

impl Request {
    /// An empty request: no properties, not enterprise, no named sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one property, creating the property map if needed.
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Marks the request as enterprise-wide (or not).
    pub fn enterprise(mut self, enterprise: bool) -> Self {
        self.enterprise = Some(enterprise);
        self
    }

    /// Names the sources the request targets.
    pub fn targeting<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_ids = ids.into_iter().map(Into::into).collect();
        self
    }
}

/// True unless the request carries `remote-destination: true`.
pub fn is_local(request: &Request) -> bool {
    match &request.properties {
        None => true,
        Some(properties) => !matches!(properties.get(REMOTE_DESTINATION_KEY), Some(Value::Bool(true))),
    }
}

/// True only when the request explicitly says it is enterprise-wide.
pub fn is_enterprise(request: &Request) -> bool {
    request.enterprise.unwrap_or(false)
}

/// # Route
///
/// Where a request goes.
pub struct Route {
    /// Whether the local catalog answers the request.
    pub include_local: bool,
    /// Remote sources to fan out to, in bind order. Only sources whose cached
    /// status is available are included.
    pub remote: Vec<Arc<dyn Source>>,
}

/// # Route Request
///
/// Enterprise requests go to every available bound source; otherwise only to
/// the available sources the request names.
pub fn route(poller: &StatusSourcePoller, request: &Request) -> Route {
    let enterprise = is_enterprise(request);

    let remote = poller
        .bound()
        .into_iter()
        .filter(|(key, _)| {
            enterprise
                || key
                    .id()
                    .is_some_and(|id| request.source_ids.iter().any(|wanted| wanted == id))
        })
        .filter(|(key, _)| poller.status_of(key).is_available())
        .map(|(_, source)| source)
        .collect();

    Route {
        include_local: is_local(request),
        remote,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_properties_mean_local() {
        assert!(is_local(&Request::new()));
    }

    #[test]
    fn remote_destination_flag_must_be_true_to_leave_local() {
        assert!(is_local(&Request::new().with_property("other", json!(1))));
        assert!(is_local(&Request::new().with_property(REMOTE_DESTINATION_KEY, json!(false))));
        assert!(is_local(&Request::new().with_property(REMOTE_DESTINATION_KEY, json!("true"))));
        assert!(!is_local(&Request::new().with_property(REMOTE_DESTINATION_KEY, json!(true))));
    }

    #[test]
    fn enterprise_defaults_to_false() {
        assert!(!is_enterprise(&Request::new()));
        assert!(!is_enterprise(&Request::new().enterprise(false)));
        assert!(is_enterprise(&Request::new().enterprise(true)));
    }
}
