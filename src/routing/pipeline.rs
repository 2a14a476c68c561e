//! Routing pipeline
//!
//! Runs the matchers of one snapshot over a candidate pool. Matcher *i*
//! receives the output of matcher *i - 1*, so every stage can only narrow the
//! pool.

use super::snapshot::RuleSnapshot;
use super::RoutingError;
use crate::endpoint::{Endpoint, RequestContext};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// The only bucket this router fills.
pub const FAILOVER_KEY: &str = "failover";

/// Filtered pools keyed by bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteBuckets(BTreeMap<String, Vec<Arc<Endpoint>>>);

impl RouteBuckets {
    fn failover(pool: Vec<Arc<Endpoint>>) -> Self {
        let mut buckets = BTreeMap::new();
        buckets.insert(FAILOVER_KEY.to_string(), pool);
        Self(buckets)
    }

    pub fn get(&self, key: &str) -> Option<&[Arc<Endpoint>]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<Arc<Endpoint>>> {
        self.0
    }
}

/// Result of [`RoutingPipeline::route`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// No rule applies (empty pool or invalid document). The chain passes the
    /// pool on unfiltered.
    NoDecision,

    /// The rule is runtime-scoped: nothing may be precomputed, the chain must
    /// call [`RoutingPipeline::evaluate`] for every call with its own context.
    PerCall,

    /// Precomputed filtering result.
    Routed(RouteBuckets),
}

impl RouteOutcome {
    /// Bucket mapping view: empty for `NoDecision` and `PerCall`.
    pub fn buckets(&self) -> RouteBuckets {
        match self {
            RouteOutcome::Routed(buckets) => buckets.clone(),
            RouteOutcome::NoDecision | RouteOutcome::PerCall => RouteBuckets::default(),
        }
    }

    /// The failover pool of a precomputed result.
    pub fn routed_pool(&self) -> Option<&[Arc<Endpoint>]> {
        match self {
            RouteOutcome::Routed(buckets) => buckets.get(FAILOVER_KEY),
            _ => None,
        }
    }
}

/// Applies one snapshot to candidate pools.
pub struct RoutingPipeline<'a> {
    snapshot: &'a RuleSnapshot,
}

impl<'a> RoutingPipeline<'a> {
    pub fn new(snapshot: &'a RuleSnapshot) -> Self {
        Self { snapshot }
    }

    /// Precompute the eligible subset, honoring the runtime flag.
    pub fn route(
        &self,
        pool: &[Arc<Endpoint>],
        context: &RequestContext,
    ) -> Result<RouteOutcome, RoutingError> {
        let document = self.snapshot.document();
        if pool.is_empty() || !document.is_valid() {
            return Ok(RouteOutcome::NoDecision);
        }
        if document.runtime() {
            tracing::trace!(
                version = self.snapshot.version(),
                "Runtime rule, deferring to per-call evaluation"
            );
            return Ok(RouteOutcome::PerCall);
        }

        let filtered = self.run(pool, context)?;
        Ok(RouteOutcome::Routed(RouteBuckets::failover(filtered)))
    }

    /// Filter `pool` for one call, ignoring the runtime flag. Invalid
    /// documents and empty pools return the pool unchanged.
    pub fn evaluate(
        &self,
        pool: &[Arc<Endpoint>],
        context: &RequestContext,
    ) -> Result<Vec<Arc<Endpoint>>, RoutingError> {
        if pool.is_empty() || !self.snapshot.document().is_valid() {
            return Ok(pool.to_vec());
        }
        self.run(pool, context)
    }

    fn run(
        &self,
        pool: &[Arc<Endpoint>],
        context: &RequestContext,
    ) -> Result<Vec<Arc<Endpoint>>, RoutingError> {
        let pipeline_start = Instant::now();
        let mut current = pool.to_vec();

        for matcher in self.snapshot.matchers() {
            let stage_start = Instant::now();
            let before = current.len();

            current = matcher
                .apply(&current, context)
                .map_err(|source| RoutingError::Matcher {
                    clause: matcher.source().to_string(),
                    source,
                })?;

            let excluded = before.saturating_sub(current.len());
            if excluded > 0 {
                metrics::counter!(
                    "condgate_clause_exclusions_total",
                    "clause" => matcher.source().to_string(),
                )
                .increment(excluded as u64);
            }

            tracing::trace!(
                version = self.snapshot.version(),
                clause = matcher.source(),
                elapsed_us = stage_start.elapsed().as_micros() as u64,
                remaining = current.len(),
                excluded,
                "Condition clause applied"
            );
        }

        metrics::histogram!("condgate_pipeline_duration_seconds")
            .record(pipeline_start.elapsed().as_secs_f64());

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{
        ClauseCompiler, CompileError, ConditionCompiler, ConditionMatcher, MatchError,
    };
    use crate::routing::snapshot::SnapshotManager;
    use crate::rule::RuleDocument;
    use std::sync::Mutex;

    fn pool() -> Vec<Arc<Endpoint>> {
        vec![
            Arc::new(
                Endpoint::new("a", "10.0.0.1", 20880)
                    .with_attribute("region", "hangzhou")
                    .with_attribute("version", "1.0"),
            ),
            Arc::new(
                Endpoint::new("b", "10.0.0.2", 20880)
                    .with_attribute("region", "beijing")
                    .with_attribute("version", "2.0"),
            ),
            Arc::new(
                Endpoint::new("c", "10.0.0.3", 20880)
                    .with_attribute("region", "hangzhou")
                    .with_attribute("version", "2.0"),
            ),
        ]
    }

    fn ids(pool: &[Arc<Endpoint>]) -> Vec<&str> {
        pool.iter().map(|e| e.id.as_str()).collect()
    }

    fn manager(conditions: &[&str], force: bool, runtime: bool) -> SnapshotManager {
        let doc = RuleDocument::new(
            conditions.iter().map(|c| c.to_string()).collect(),
            force,
            runtime,
        );
        SnapshotManager::new(doc, Arc::new(ClauseCompiler)).unwrap()
    }

    /// Records the order in which matchers run.
    #[derive(Debug)]
    struct Recording {
        source: String,
        log: Arc<Mutex<Vec<String>>>,
    }
    impl ConditionMatcher for Recording {
        fn source(&self) -> &str {
            &self.source
        }
        fn apply(
            &self,
            pool: &[Arc<Endpoint>],
            _context: &RequestContext,
        ) -> Result<Vec<Arc<Endpoint>>, MatchError> {
            self.log.lock().unwrap().push(self.source.clone());
            if self.source == "fail" {
                return Err(MatchError::new("boom"));
            }
            Ok(pool.to_vec())
        }
    }

    struct RecordingCompiler {
        log: Arc<Mutex<Vec<String>>>,
    }
    impl ConditionCompiler for RecordingCompiler {
        fn compile(
            &self,
            clause: &str,
            _force: bool,
        ) -> Result<Box<dyn ConditionMatcher>, CompileError> {
            Ok(Box::new(Recording {
                source: clause.to_string(),
                log: self.log.clone(),
            }))
        }
    }

    #[test]
    fn empty_pool_is_no_decision() {
        let manager = manager(&["=> region=hangzhou"], false, false);
        let snapshot = manager.current();
        let outcome = RoutingPipeline::new(&snapshot)
            .route(&[], &RequestContext::new())
            .unwrap();
        assert_eq!(outcome, RouteOutcome::NoDecision);
        assert!(outcome.buckets().is_empty());
    }

    #[test]
    fn invalid_document_is_no_decision() {
        let manager = manager(&[], true, true);
        let snapshot = manager.current();
        let pipeline = RoutingPipeline::new(&snapshot);
        let outcome = pipeline.route(&pool(), &RequestContext::new()).unwrap();
        assert_eq!(outcome, RouteOutcome::NoDecision);

        let evaluated = pipeline.evaluate(&pool(), &RequestContext::new()).unwrap();
        assert_eq!(ids(&evaluated), vec!["a", "b", "c"]);
    }

    #[test]
    fn runtime_document_defers() {
        let manager = manager(&["=> region=hangzhou"], false, true);
        let snapshot = manager.current();
        let outcome = RoutingPipeline::new(&snapshot)
            .route(&pool(), &RequestContext::new())
            .unwrap();
        assert_eq!(outcome, RouteOutcome::PerCall);
        assert!(outcome.routed_pool().is_none());
    }

    #[test]
    fn clauses_chain_in_order() {
        let manager = manager(&["=> region=hangzhou", "=> version=2.0"], false, false);
        let snapshot = manager.current();
        let outcome = RoutingPipeline::new(&snapshot)
            .route(&pool(), &RequestContext::new())
            .unwrap();
        assert_eq!(ids(outcome.routed_pool().unwrap()), vec!["c"]);
        assert_eq!(outcome.buckets().len(), 1);
    }

    #[test]
    fn matchers_run_in_document_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let doc = RuleDocument::new(
            vec!["first".to_string(), "second".to_string(), "third".to_string()],
            false,
            false,
        );
        let manager =
            SnapshotManager::new(doc, Arc::new(RecordingCompiler { log: log.clone() })).unwrap();
        let snapshot = manager.current();
        RoutingPipeline::new(&snapshot)
            .route(&pool(), &RequestContext::new())
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn matcher_failure_stops_pipeline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let doc = RuleDocument::new(vec!["fail".to_string(), "after".to_string()], false, false);
        let manager =
            SnapshotManager::new(doc, Arc::new(RecordingCompiler { log: log.clone() })).unwrap();
        let snapshot = manager.current();
        let result = RoutingPipeline::new(&snapshot).route(&pool(), &RequestContext::new());
        assert!(matches!(
            result,
            Err(RoutingError::Matcher { ref clause, .. }) if clause == "fail"
        ));
        assert_eq!(*log.lock().unwrap(), vec!["fail"]);
    }

    #[test]
    fn evaluate_ignores_runtime_flag() {
        let manager = manager(&["region=beijing => region=beijing"], false, true);
        let snapshot = manager.current();
        let pipeline = RoutingPipeline::new(&snapshot);
        let bj = RequestContext::new().with_attribute("region", "beijing");
        let sh = RequestContext::new().with_attribute("region", "shanghai");
        assert_eq!(ids(&pipeline.evaluate(&pool(), &bj).unwrap()), vec!["b"]);
        assert_eq!(ids(&pipeline.evaluate(&pool(), &sh).unwrap()), vec!["a", "b", "c"]);
    }

    #[test]
    fn input_pool_is_not_mutated() {
        let manager = manager(&["=> region=beijing"], true, false);
        let snapshot = manager.current();
        let input = pool();
        RoutingPipeline::new(&snapshot)
            .route(&input, &RequestContext::new())
            .unwrap();
        assert_eq!(ids(&input), vec!["a", "b", "c"]);
    }
}
