//! Directory-backed configuration source
//!
//! Each key maps to `<dir>/<key>.yaml`. A background task polls the files of
//! subscribed keys and pushes an event whenever their content changes.
//!
//! A missing file means no rule is published. A missing directory, or a key
//! that is not a plain file name, makes the source unavailable for that key.

use super::{ConfigChangeEvent, ConfigChangeType, ConfigSource, SourceError, Subscription};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct WatchedKey {
    last: Option<String>,
    sender: broadcast::Sender<ConfigChangeEvent>,
}

/// Polled directory of rule files.
pub struct FileConfigSource {
    dir: PathBuf,
    poll_interval: Duration,
    capacity: usize,
    watched: DashMap<String, WatchedKey>,
}

impl FileConfigSource {
    pub fn new(dir: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self::with_capacity(dir, poll_interval, super::DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(dir: impl Into<PathBuf>, poll_interval: Duration, capacity: usize) -> Self {
        Self {
            dir: dir.into(),
            poll_interval,
            capacity: capacity.max(1),
            watched: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.yaml", key))
    }

    fn read(&self, key: &str) -> Result<Option<String>, SourceError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(SourceError::Unavailable {
                key: key.to_string(),
                reason: "key is not a plain file name".to_string(),
            });
        }

        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !self.dir.is_dir() => {
                Err(SourceError::Unavailable {
                    key: key.to_string(),
                    reason: format!("rules directory {} does not exist", self.dir.display()),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SourceError::Io { path, source }),
        }
    }

    /// Check every subscribed key once. Returns the number of changes found.
    pub fn poll(&self) -> usize {
        let mut changed = 0;

        for mut entry in self.watched.iter_mut() {
            let key = entry.key().clone();
            let current = match self.read(&key) {
                Ok(current) => current,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping unreadable rule file");
                    continue;
                }
            };

            let watched = entry.value_mut();
            if current == watched.last {
                continue;
            }

            let change_type = match (&watched.last, &current) {
                (None, _) => ConfigChangeType::Added,
                (Some(_), None) => ConfigChangeType::Deleted,
                (Some(_), Some(_)) => ConfigChangeType::Modified,
            };
            watched.last = current.clone();
            changed += 1;

            tracing::debug!(key = %key, change = ?change_type, "Rule file changed");
            // Nobody listening is not an error
            let _ = watched
                .sender
                .send(ConfigChangeEvent::new(key, current, change_type));
        }

        changed
    }

    /// Poll until cancelled.
    pub fn start(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                dir = %self.dir.display(),
                interval_ms = self.poll_interval.as_millis() as u64,
                "Rule file poller started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Rule file poller shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let changed = self.poll();
                        if changed > 0 {
                            tracing::debug!(changed, "Rule file poll found changes");
                        }
                    }
                }
            }
        })
    }
}

impl ConfigSource for FileConfigSource {
    fn get_config(&self, key: &str) -> Result<Option<String>, SourceError> {
        self.read(key)
    }

    fn subscribe(&self, key: &str) -> Result<Subscription, SourceError> {
        let initial = self.read(key)?;
        let capacity = self.capacity;
        let mut entry = self
            .watched
            .entry(key.to_string())
            .or_insert_with(|| WatchedKey {
                last: None,
                sender: broadcast::channel(capacity).0,
            });
        entry.last = initial.clone();
        let changes = entry.sender.subscribe();

        Ok(Subscription {
            key: key.to_string(),
            initial,
            changes,
        })
    }
}
