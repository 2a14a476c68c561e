//! Condition routing filter stage
//!
//! [`ConditionRouter`] is what the router chain talks to. It owns the
//! [`SnapshotManager`] holding the active rule and runs a
//! [`RoutingPipeline`] over the current snapshot on every call. Rule changes
//! arrive through [`ConditionRouter::install`], driven by the
//! [`RuleListener`](crate::listener::RuleListener).

pub mod error;
pub mod pipeline;
pub mod snapshot;

pub use error::{RouterError, RoutingError};
pub use pipeline::{RouteBuckets, RouteOutcome, RoutingPipeline, FAILOVER_KEY};
pub use snapshot::{RuleSnapshot, SnapshotManager};

use crate::condition::{ClauseCompiler, ConditionCompiler};
use crate::endpoint::{Endpoint, RequestContext};
use crate::rule::{self, RuleDocument};
use crate::source::{ConfigSource, Subscription};
use std::sync::Arc;

/// Configuration key suffix under which an application's rule is published.
pub const RULE_KEY_SUFFIX: &str = ".condition-router";

/// Configuration key holding the condition rule of `application`.
pub fn rule_key(application: &str) -> String {
    format!("{}{}", application, RULE_KEY_SUFFIX)
}

/// Configuration-driven condition filter.
pub struct ConditionRouter {
    key: String,
    snapshots: SnapshotManager,
}

impl ConditionRouter {
    /// Stable identifier of this filter stage.
    pub const NAME: &'static str = "config-condition-outer";

    /// Fixed stage priority; lower than application-level rules.
    pub const PRIORITY: i32 = -2;

    /// Build a router from rule text already in hand. Parse or compile
    /// failure is fatal.
    pub fn new(
        key: impl Into<String>,
        raw_rule: Option<&str>,
        compiler: Arc<dyn ConditionCompiler>,
    ) -> Result<Self, RouterError> {
        let key = key.into();
        let document = rule::parse(raw_rule)?;
        let snapshots = SnapshotManager::new(document, compiler)?;

        let snapshot = snapshots.current();
        tracing::info!(
            key = %key,
            valid = snapshot.document().is_valid(),
            clauses = snapshot.matchers().len(),
            "Condition router initialized"
        );

        Ok(Self { key, snapshots })
    }

    /// Subscribe to `application`'s rule on `source` and build the router
    /// from the initial text. Returns the router and the change stream, which
    /// the caller hands to a [`RuleListener`](crate::listener::RuleListener).
    pub fn subscribe(
        source: &dyn ConfigSource,
        application: &str,
        compiler: Arc<dyn ConditionCompiler>,
    ) -> Result<(Self, Subscription), RouterError> {
        let key = rule_key(application);
        let subscription = source.subscribe(&key)?;
        let router = Self::new(key, subscription.initial.as_deref(), compiler)?;
        Ok((router, subscription))
    }

    /// [`ConditionRouter::subscribe`] with the default clause compiler.
    pub fn subscribe_default(
        source: &dyn ConfigSource,
        application: &str,
    ) -> Result<(Self, Subscription), RouterError> {
        Self::subscribe(source, application, Arc::new(ClauseCompiler))
    }

    /// Parse and install a new rule version. On error the previous snapshot
    /// stays active.
    pub fn install(&self, raw_rule: Option<&str>) -> Result<Arc<RuleSnapshot>, RouterError> {
        let document = rule::parse(raw_rule)?;
        Ok(self.snapshots.replace(document)?)
    }

    /// Install an already parsed document.
    pub fn install_document(&self, document: RuleDocument) -> Result<Arc<RuleSnapshot>, RouterError> {
        Ok(self.snapshots.replace(document)?)
    }

    /// Precompute the eligible pool for `context`.
    pub fn route(
        &self,
        pool: &[Arc<Endpoint>],
        context: &RequestContext,
    ) -> Result<RouteOutcome, RoutingError> {
        let snapshot = self.snapshots.load();
        RoutingPipeline::new(&snapshot).route(pool, context)
    }

    /// Evaluate the active rule for one call, regardless of runtime mode.
    pub fn evaluate(
        &self,
        pool: &[Arc<Endpoint>],
        context: &RequestContext,
    ) -> Result<Vec<Arc<Endpoint>>, RoutingError> {
        let snapshot = self.snapshots.load();
        RoutingPipeline::new(&snapshot).evaluate(pool, context)
    }

    /// Active snapshot.
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.snapshots.current()
    }

    /// Whether an empty result must fail the call.
    pub fn is_force(&self) -> bool {
        self.snapshots.load().is_force()
    }

    /// Whether filtering must be redone for every call.
    pub fn is_runtime(&self) -> bool {
        self.snapshots.load().is_runtime()
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    /// Configuration key the rule is read from.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for ConditionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshots.load();
        f.debug_struct("ConditionRouter")
            .field("key", &self.key)
            .field("version", &snapshot.version())
            .field("valid", &snapshot.document().is_valid())
            .finish()
    }
}
