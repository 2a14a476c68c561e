//! Shared test utilities for condgate integration tests.
//!
//! Endpoint pools, call contexts, rule text builders and an instrumented
//! compiler whose matchers record which clause produced them.

#![allow(dead_code)]

use condgate::condition::{CompileError, ConditionMatcher, MatchError};
use condgate::{ClauseCompiler, ConditionCompiler, Endpoint, Pool, RequestContext};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// =============================================================================
// Well-Known Test Constants
// =============================================================================

pub const APPLICATION: &str = "demo";
pub const RULE_KEY: &str = "demo.condition-router";

// =============================================================================
// Endpoint Builders
// =============================================================================

/// Create an endpoint with a region attribute.
pub fn make_endpoint(id: &str, host: &str, region: &str) -> Arc<Endpoint> {
    Arc::new(Endpoint::new(id, host, 20880).with_attribute("region", region))
}

/// `[A(hangzhou), B(beijing)]`
pub fn two_region_pool() -> Pool {
    vec![
        make_endpoint("A", "10.0.0.1", "hangzhou"),
        make_endpoint("B", "10.0.0.2", "beijing"),
    ]
}

/// `n` endpoints cycling through four regions.
pub fn region_pool(n: usize) -> Pool {
    const REGIONS: [&str; 4] = ["hangzhou", "beijing", "shanghai", "shenzhen"];
    (0..n)
        .map(|i| {
            make_endpoint(
                &format!("ep-{}", i),
                &format!("10.0.{}.{}", i / 250, i % 250 + 1),
                REGIONS[i % REGIONS.len()],
            )
        })
        .collect()
}

pub fn ids(pool: &[Arc<Endpoint>]) -> Vec<String> {
    pool.iter().map(|e| e.id.clone()).collect()
}

// =============================================================================
// Context Builders
// =============================================================================

pub fn caller_in(region: &str) -> RequestContext {
    RequestContext::new().with_attribute("region", region)
}

// =============================================================================
// Rule Builders
// =============================================================================

/// Render a rule document.
pub fn rule_yaml(conditions: &[&str], force: bool, runtime: bool) -> String {
    let mut yaml = format!("force: {}\nruntime: {}\nconditions:\n", force, runtime);
    for condition in conditions {
        yaml.push_str(&format!("  - \"{}\"\n", condition));
    }
    yaml
}

/// Same-region routing for hangzhou callers.
pub fn hangzhou_rule() -> String {
    rule_yaml(&["region=hangzhou => region=hangzhou"], false, false)
}

// =============================================================================
// Instrumented Compiler
// =============================================================================

/// Matcher that delegates to the real clause and counts invocations.
#[derive(Debug)]
pub struct TaggedMatcher {
    inner: Box<dyn ConditionMatcher>,
    calls: Arc<AtomicUsize>,
}

impl ConditionMatcher for TaggedMatcher {
    fn source(&self) -> &str {
        self.inner.source()
    }

    fn apply(
        &self,
        pool: &[Arc<Endpoint>],
        context: &RequestContext,
    ) -> Result<Vec<Arc<Endpoint>>, MatchError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.apply(pool, context)
    }
}

/// Compiler wrapping [`ClauseCompiler`] and counting matcher invocations.
#[derive(Debug, Default)]
pub struct CountingCompiler {
    pub calls: Arc<AtomicUsize>,
    pub compiled: AtomicUsize,
}

impl CountingCompiler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn compiled(&self) -> usize {
        self.compiled.load(Ordering::Relaxed)
    }
}

impl ConditionCompiler for CountingCompiler {
    fn compile(
        &self,
        clause: &str,
        force: bool,
    ) -> Result<Box<dyn ConditionMatcher>, CompileError> {
        self.compiled.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(TaggedMatcher {
            inner: ClauseCompiler.compile(clause, force)?,
            calls: self.calls.clone(),
        }))
    }
}

/// Matcher that always fails, for error propagation tests.
#[derive(Debug)]
pub struct FailingMatcher {
    pub source: String,
}

impl ConditionMatcher for FailingMatcher {
    fn source(&self) -> &str {
        &self.source
    }

    fn apply(
        &self,
        _pool: &[Arc<Endpoint>],
        _context: &RequestContext,
    ) -> Result<Vec<Arc<Endpoint>>, MatchError> {
        Err(MatchError::new("lookup backend unavailable"))
    }
}

/// Compiles `fail` clauses to [`FailingMatcher`], everything else normally.
#[derive(Debug, Default)]
pub struct FailingCompiler;

impl ConditionCompiler for FailingCompiler {
    fn compile(
        &self,
        clause: &str,
        force: bool,
    ) -> Result<Box<dyn ConditionMatcher>, CompileError> {
        if clause.trim() == "fail" {
            return Ok(Box::new(FailingMatcher {
                source: clause.to_string(),
            }));
        }
        ClauseCompiler.compile(clause, force)
    }
}
