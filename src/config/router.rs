//! Router configuration

use serde::{Deserialize, Serialize};

/// Which application's rule the router subscribes to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Subscribed key becomes `{application}.condition-router`
    pub application: String,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            application: "demo".to_string(),
        }
    }
}

impl RouterSettings {
    pub fn rule_key(&self) -> String {
        crate::routing::rule_key(&self.application)
    }
}

/// Change notification buffering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Buffered messages per receiver before it starts lagging
    pub capacity: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            capacity: crate::source::DEFAULT_EVENT_CAPACITY,
        }
    }
}
