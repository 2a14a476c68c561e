//! In-process configuration source

use super::{ConfigChangeEvent, ConfigChangeType, ConfigSource, SourceError, Subscription};
use dashmap::DashMap;
use tokio::sync::broadcast;

/// Configuration held in memory; changes are pushed by calling
/// [`publish`](Self::publish) and [`remove`](Self::remove).
pub struct MemoryConfigSource {
    values: DashMap<String, String>,
    channels: DashMap<String, broadcast::Sender<ConfigChangeEvent>>,
    capacity: usize,
}

impl MemoryConfigSource {
    pub fn new() -> Self {
        Self::with_capacity(super::DEFAULT_EVENT_CAPACITY)
    }

    /// `capacity` is the per-key event buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: DashMap::new(),
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Set `key` and notify subscribers.
    pub fn publish(&self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let change_type = match self.values.insert(key.to_string(), value.clone()) {
            Some(_) => ConfigChangeType::Modified,
            None => ConfigChangeType::Added,
        };
        self.notify(ConfigChangeEvent::new(key, Some(value), change_type));
    }

    /// Delete `key` and notify subscribers.
    pub fn remove(&self, key: &str) {
        if self.values.remove(key).is_some() {
            self.notify(ConfigChangeEvent::new(key, None, ConfigChangeType::Deleted));
        }
    }

    fn notify(&self, event: ConfigChangeEvent) {
        if let Some(sender) = self.channels.get(&event.key) {
            // No receivers is fine
            let delivered = sender.send(event.clone()).unwrap_or(0);
            tracing::debug!(
                key = %event.key,
                change = ?event.change_type,
                receivers = delivered,
                "Configuration change pushed"
            );
        }
    }
}

impl Default for MemoryConfigSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for MemoryConfigSource {
    fn get_config(&self, key: &str) -> Result<Option<String>, SourceError> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    fn subscribe(&self, key: &str) -> Result<Subscription, SourceError> {
        let changes = self
            .channels
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        Ok(Subscription {
            key: key.to_string(),
            initial: self.get_config(key)?,
            changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_config_returns_published_value() {
        let source = MemoryConfigSource::new();
        assert_eq!(source.get_config("k").unwrap(), None);
        source.publish("k", "v1");
        assert_eq!(source.get_config("k").unwrap().as_deref(), Some("v1"));
    }

    #[test]
    fn subscription_sees_initial_then_changes() {
        let source = MemoryConfigSource::new();
        source.publish("k", "v1");

        let mut sub = source.subscribe("k").unwrap();
        assert_eq!(sub.initial.as_deref(), Some("v1"));

        source.publish("k", "v2");
        source.remove("k");
        source.publish("k", "v3");

        let modified = sub.changes.try_recv().unwrap();
        assert_eq!(modified.change_type, ConfigChangeType::Modified);
        assert_eq!(modified.value.as_deref(), Some("v2"));

        let deleted = sub.changes.try_recv().unwrap();
        assert_eq!(deleted.change_type, ConfigChangeType::Deleted);
        assert_eq!(deleted.value, None);

        let added = sub.changes.try_recv().unwrap();
        assert_eq!(added.change_type, ConfigChangeType::Added);
    }

    #[test]
    fn publish_without_subscribers_does_not_fail() {
        let source = MemoryConfigSource::new();
        source.publish("k", "v1");
        source.remove("k");
        source.remove("never-set");
        assert_eq!(source.get_config("k").unwrap(), None);
    }

    #[test]
    fn keys_are_isolated() {
        let source = MemoryConfigSource::new();
        let mut a = source.subscribe("a").unwrap();
        source.publish("b", "x");
        assert!(a.changes.try_recv().is_err());
    }
}
