//! Rule change listener
//!
//! Bridges pushed configuration changes into snapshot replacement:
//!
//! ```text
//! Idle --text--> Parsing --ok--> Installing --ok--> Idle (+ RuleChanged broadcast)
//!                   |                 |
//!                   +------error------+--> Idle (previous snapshot kept)
//! ```
//!
//! A single task started with [`RuleListener::start`] consumes the change
//! stream, so installs happen one at a time and in arrival order.

use crate::routing::{ConditionRouter, RouterError, RuleSnapshot};
use crate::source::{ConfigChangeEvent, ConfigSource};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Where the listener is in processing a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ListenerState {
    Idle = 0,
    Parsing = 1,
    Installing = 2,
}

impl From<u8> for ListenerState {
    fn from(value: u8) -> Self {
        match value {
            1 => ListenerState::Parsing,
            2 => ListenerState::Installing,
            _ => ListenerState::Idle,
        }
    }
}

/// Sent to the owning chain after every successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleChanged {
    pub key: String,
    pub version: u64,
    pub valid: bool,
    pub force: bool,
    pub runtime: bool,
}

impl RuleChanged {
    fn from_snapshot(key: &str, snapshot: &RuleSnapshot) -> Self {
        let document = snapshot.document();
        Self {
            key: key.to_string(),
            version: snapshot.version(),
            valid: document.is_valid(),
            force: document.force(),
            runtime: document.runtime(),
        }
    }
}

/// Applies configuration pushes to a [`ConditionRouter`].
pub struct RuleListener {
    router: Arc<ConditionRouter>,
    notifier: broadcast::Sender<RuleChanged>,
    state: AtomicU8,
}

impl RuleListener {
    /// `capacity` bounds buffered [`RuleChanged`] messages per receiver.
    pub fn new(router: Arc<ConditionRouter>, capacity: usize) -> Self {
        let (notifier, _) = broadcast::channel(capacity.max(1));
        Self {
            router,
            notifier,
            state: AtomicU8::new(ListenerState::Idle as u8),
        }
    }

    pub fn router(&self) -> &Arc<ConditionRouter> {
        &self.router
    }

    pub fn state(&self) -> ListenerState {
        self.state.load(Ordering::Acquire).into()
    }

    /// Receive a message after each successful install.
    pub fn subscribe(&self) -> broadcast::Receiver<RuleChanged> {
        self.notifier.subscribe()
    }

    fn set_state(&self, state: ListenerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Handle one change event.
    pub fn process(&self, event: &ConfigChangeEvent) -> Result<Arc<RuleSnapshot>, RouterError> {
        if event.key != self.router.key() {
            tracing::debug!(key = %event.key, "Ignoring change for foreign key");
            return Ok(self.router.snapshot());
        }
        tracing::debug!(key = %event.key, change = ?event.change_type, "Rule change received");
        self.apply(event.value.as_deref())
    }

    /// Parse and install `raw`, then notify the chain.
    pub fn apply(&self, raw: Option<&str>) -> Result<Arc<RuleSnapshot>, RouterError> {
        self.set_state(ListenerState::Parsing);
        let document = match crate::rule::parse(raw) {
            Ok(document) => document,
            Err(e) => return Err(self.reject(e.into())),
        };

        self.set_state(ListenerState::Installing);
        let snapshot = match self.router.install_document(document) {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.reject(e)),
        };
        self.set_state(ListenerState::Idle);

        metrics::counter!("condgate_rule_updates_total", "outcome" => "installed").increment(1);

        let message = RuleChanged::from_snapshot(self.router.key(), &snapshot);
        // Fire and forget: no chain listening is fine
        let receivers = self.notifier.send(message).unwrap_or(0);
        tracing::debug!(
            key = %self.router.key(),
            version = snapshot.version(),
            receivers,
            "Router chain notified of rule change"
        );

        Ok(snapshot)
    }

    fn reject(&self, error: RouterError) -> RouterError {
        self.set_state(ListenerState::Idle);
        metrics::counter!("condgate_rule_updates_total", "outcome" => "rejected").increment(1);
        tracing::error!(
            key = %self.router.key(),
            error = %error,
            active_version = self.router.snapshot().version(),
            "Rule update rejected, keeping last good rule"
        );
        error
    }

    /// Re-read the key from `source` after missed events. A failed read is
    /// rejected like a bad rule: logged, counted, last good rule kept.
    pub fn resync(&self, source: &dyn ConfigSource) -> Result<Arc<RuleSnapshot>, RouterError> {
        let raw = match source.get_config(self.router.key()) {
            Ok(raw) => raw,
            Err(e) => return Err(self.reject(e.into())),
        };
        self.apply(raw.as_deref())
    }

    /// Consume `changes` until cancelled or the stream closes.
    pub fn start(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<ConfigChangeEvent>,
        source: Arc<dyn ConfigSource>,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(key = %self.router.key(), "Rule listener started");

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Rule listener shutting down");
                        break;
                    }
                    received = changes.recv() => match received {
                        Ok(event) => {
                            // Errors are logged in apply
                            let _ = self.process(&event);
                        }
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "Rule listener lagged, resynchronizing");
                            // Errors are logged in reject
                            let _ = self.resync(source.as_ref());
                        }
                        Err(RecvError::Closed) => {
                            tracing::info!("Configuration stream closed, rule listener stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}

/// A router wired to its source and a running listener.
pub struct Attached {
    pub router: Arc<ConditionRouter>,
    pub listener: Arc<RuleListener>,
    pub handle: JoinHandle<()>,
}

/// Subscribe `application`'s rule on `source`, build the router and start
/// listening for changes. Fails if the initial rule cannot be read or built.
pub fn attach(
    source: Arc<dyn ConfigSource>,
    application: &str,
    compiler: Arc<dyn crate::condition::ConditionCompiler>,
    capacity: usize,
    cancel_token: CancellationToken,
) -> Result<Attached, RouterError> {
    let (router, subscription) =
        ConditionRouter::subscribe(source.as_ref(), application, compiler)?;
    let router = Arc::new(router);
    let listener = Arc::new(RuleListener::new(router.clone(), capacity));
    let handle = listener
        .clone()
        .start(subscription.changes, source, cancel_token);

    Ok(Attached {
        router,
        listener,
        handle,
    })
}
