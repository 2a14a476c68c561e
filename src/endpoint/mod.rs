//! Endpoint and call-context model
//!
//! An [`Endpoint`] is one callable remote service instance (an invoker) that the
//! router may keep or drop. A [`RequestContext`] describes the consumer side of a
//! single outbound call. Condition clauses read both through string lookups.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Ordered candidate pool for one call.
pub type Pool = Vec<Arc<Endpoint>>;

/// A remote service instance considered as a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Stable identifier, used in logs and CLI output
    pub id: String,
    /// Provider host (IP or hostname)
    pub host: String,
    /// Provider port
    #[serde(default)]
    pub port: u16,
    /// Provider attributes (region, version, zone, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Endpoint {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute (builder style).
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve a then-clause key against this endpoint.
    ///
    /// `host`, `port`, `address` and `id` are built-in; everything else comes
    /// from the attribute map.
    pub fn lookup(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "host" => Some(Cow::Borrowed(self.host.as_str())),
            "port" => Some(Cow::Owned(self.port.to_string())),
            "address" => Some(Cow::Owned(self.address())),
            "id" => Some(Cow::Borrowed(self.id.as_str())),
            _ => self.attributes.get(key).map(|v| Cow::Borrowed(v.as_str())),
        }
    }
}

/// Consumer-side view of one outbound call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Caller host
    #[serde(default)]
    pub host: Option<String>,
    /// Invoked method name
    #[serde(default)]
    pub method: Option<String>,
    /// Stringified call arguments, addressable as `arguments[N]`
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Caller attributes (application, region, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn with_argument(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Resolve a when-clause key (or a `$key` reference) against this call.
    pub fn lookup(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "host" => self.host.as_deref().map(Cow::Borrowed),
            "method" => self.method.as_deref().map(Cow::Borrowed),
            _ => {
                if let Some(index) = argument_index(key) {
                    return self.arguments.get(index).map(|v| Cow::Borrowed(v.as_str()));
                }
                self.attributes.get(key).map(|v| Cow::Borrowed(v.as_str()))
            }
        }
    }
}

/// Parse `arguments[N]` into `N`.
pub(crate) fn argument_index(key: &str) -> Option<usize> {
    key.strip_prefix("arguments[")?
        .strip_suffix(']')?
        .trim()
        .parse()
        .ok()
}
