//! Minimal router chain
//!
//! Owns the endpoint pool and caches the precomputed routing plan of a
//! [`ConditionRouter`]. A plan records the rule version and the pool it was
//! built from and is only served while both are still current, so a plan
//! stored by a call that raced a rule change or a pool update is rebuilt on
//! the next call. Runtime rules bypass the cache and are evaluated for every
//! call.
//!
//! The chain also owns the `force` policy: an empty result fails the call
//! when the rule is forced, and falls back to the unfiltered pool otherwise.
//! Each call reads one snapshot, so the runtime flag, the filtered pool and
//! the force policy always come from the same rule.

use crate::endpoint::{Endpoint, Pool, RequestContext};
use crate::listener::RuleChanged;
use crate::routing::{ConditionRouter, RouteOutcome, RoutingError, RoutingPipeline, RuleSnapshot};
use arc_swap::{ArcSwap, ArcSwapOption};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cached result of one precomputation.
#[derive(Debug)]
struct Plan {
    /// Snapshot version the plan was computed under
    version: u64,
    /// Pool the plan was computed from
    endpoints: Arc<Pool>,
    /// `None` when the router made no decision
    filtered: Option<Pool>,
}

impl Plan {
    fn is_current(&self, snapshot: &RuleSnapshot, endpoints: &Arc<Pool>) -> bool {
        self.version == snapshot.version() && Arc::ptr_eq(&self.endpoints, endpoints)
    }
}

/// Chain holding one condition router stage.
pub struct RouterChain {
    router: Arc<ConditionRouter>,
    endpoints: ArcSwap<Pool>,
    baseline: RequestContext,
    plan: ArcSwapOption<Plan>,
}

impl RouterChain {
    /// `baseline` is the consumer-level context used for precomputed plans.
    pub fn new(router: Arc<ConditionRouter>, endpoints: Pool, baseline: RequestContext) -> Self {
        Self {
            router,
            endpoints: ArcSwap::from_pointee(endpoints),
            baseline,
            plan: ArcSwapOption::empty(),
        }
    }

    pub fn router(&self) -> &Arc<ConditionRouter> {
        &self.router
    }

    pub fn endpoints(&self) -> Arc<Pool> {
        self.endpoints.load_full()
    }

    /// Replace the candidate pool; the cached plan is dropped.
    pub fn set_endpoints(&self, endpoints: Pool) {
        self.endpoints.store(Arc::new(endpoints));
        self.invalidate();
    }

    /// Drop the cached plan.
    pub fn invalidate(&self) {
        self.plan.store(None);
    }

    /// Whether a precomputed plan is cached.
    pub fn has_plan(&self) -> bool {
        self.plan.load().is_some()
    }

    /// Rule version the cached plan was computed under.
    pub fn plan_version(&self) -> Option<u64> {
        self.plan.load().as_ref().map(|plan| plan.version)
    }

    /// Select the endpoints eligible for a call.
    pub fn route(&self, context: &RequestContext) -> Result<Vec<Arc<Endpoint>>, RoutingError> {
        let snapshot = self.router.snapshot();
        let endpoints = self.endpoints.load_full();
        self.route_with(&snapshot, &endpoints, context)
    }

    fn route_with(
        &self,
        snapshot: &RuleSnapshot,
        endpoints: &Arc<Pool>,
        context: &RequestContext,
    ) -> Result<Vec<Arc<Endpoint>>, RoutingError> {
        let filtered = if snapshot.is_runtime() {
            Some(RoutingPipeline::new(snapshot).evaluate(endpoints, context)?)
        } else {
            self.planned(snapshot, endpoints, context)?
        };

        match filtered {
            None => Ok(endpoints.to_vec()),
            Some(pool) if !pool.is_empty() => Ok(pool),
            Some(_) if snapshot.is_force() => Err(RoutingError::ForcedEmpty {
                key: self.router.key().to_string(),
            }),
            Some(_) => {
                tracing::debug!(
                    key = %self.router.key(),
                    version = snapshot.version(),
                    "Rule left no endpoints, falling back to full pool"
                );
                Ok(endpoints.to_vec())
            }
        }
    }

    /// Cached plan, recomputed from the baseline context when missing or
    /// built from another snapshot or pool.
    fn planned(
        &self,
        snapshot: &RuleSnapshot,
        endpoints: &Arc<Pool>,
        context: &RequestContext,
    ) -> Result<Option<Pool>, RoutingError> {
        if let Some(plan) = self.plan.load_full() {
            if plan.is_current(snapshot, endpoints) {
                return Ok(plan.filtered.clone());
            }
        }

        let pipeline = RoutingPipeline::new(snapshot);
        let filtered = match pipeline.route(endpoints, &self.baseline)? {
            RouteOutcome::NoDecision => None,
            RouteOutcome::PerCall => return Ok(Some(pipeline.evaluate(endpoints, context)?)),
            outcome => outcome.routed_pool().map(<[Arc<Endpoint>]>::to_vec),
        };
        self.plan.store(Some(Arc::new(Plan {
            version: snapshot.version(),
            endpoints: Arc::clone(endpoints),
            filtered: filtered.clone(),
        })));
        tracing::debug!(
            key = %self.router.key(),
            version = snapshot.version(),
            "Routing plan recomputed"
        );
        Ok(filtered)
    }

    /// Drop the cached plan whenever the rule changes.
    pub fn spawn_invalidation(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<RuleChanged>,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    received = changes.recv() => match received {
                        Ok(change) => {
                            tracing::info!(
                                key = %change.key,
                                version = change.version,
                                "Rule changed, invalidating routing plan"
                            );
                            self.invalidate();
                        }
                        Err(RecvError::Lagged(_)) => self.invalidate(),
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        })
    }
}
