//! Configuration sources
//!
//! A [`ConfigSource`] delivers raw rule text for a key and pushes
//! [`ConfigChangeEvent`]s when that text changes. Two sources are provided:
//!
//! - [`MemoryConfigSource`]: in-process, changed with `publish` / `remove`
//! - [`FileConfigSource`]: one YAML file per key in a directory, polled

mod error;
pub mod file;
pub mod memory;

pub use error::SourceError;
pub use file::FileConfigSource;
pub use memory::MemoryConfigSource;

use tokio::sync::broadcast;

/// Buffered events per subscribed key before slow receivers start lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 16;

/// Kind of change behind an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigChangeType {
    Added,
    Modified,
    Deleted,
}

/// A pushed change of one configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChangeEvent {
    pub key: String,
    /// New raw text; `None` when the key was deleted
    pub value: Option<String>,
    pub change_type: ConfigChangeType,
}

impl ConfigChangeEvent {
    pub fn new(key: impl Into<String>, value: Option<String>, change_type: ConfigChangeType) -> Self {
        Self {
            key: key.into(),
            value,
            change_type,
        }
    }
}

/// Initial text plus the change stream for one key.
#[derive(Debug)]
pub struct Subscription {
    pub key: String,
    pub initial: Option<String>,
    pub changes: broadcast::Receiver<ConfigChangeEvent>,
}

/// Where rule text comes from.
pub trait ConfigSource: Send + Sync {
    /// Current text for `key`, `None` if nothing is published.
    fn get_config(&self, key: &str) -> Result<Option<String>, SourceError>;

    /// Current text for `key` plus a stream of later changes.
    fn subscribe(&self, key: &str) -> Result<Subscription, SourceError>;
}
