//! Hot reload under concurrent routing
//!
//! Readers route continuously while a writer swaps rule versions. Every
//! observed snapshot must pair a document with the matchers compiled from
//! it, and every routing result must be the output of exactly one version.

mod common;

use common::*;
use condgate::{ConditionRouter, RequestContext, RouteOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const READERS: usize = 4;
const INSTALLS: usize = 200;

fn hangzhou_only() -> String {
    rule_yaml(&["=> region=hangzhou"], false, false)
}

fn beijing_runtime() -> String {
    rule_yaml(&["=> region != hangzhou", "=> region=beijing"], true, true)
}

#[test]
fn concurrent_installs_never_expose_mixed_snapshots() {
    let compiler = Arc::new(CountingCompiler::default());
    let router = Arc::new(
        ConditionRouter::new(RULE_KEY, Some(&hangzhou_only()), compiler.clone()).unwrap(),
    );
    let pool = region_pool(16);
    let ctx = RequestContext::new();

    let expected_a = ids(&router.evaluate(&pool, &ctx).unwrap());
    router.install(Some(&beijing_runtime())).unwrap();
    let expected_b = ids(&router.evaluate(&pool, &ctx).unwrap());
    assert_ne!(expected_a, expected_b);

    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        for _ in 0..READERS {
            scope.spawn(|| {
                let mut observed = 0usize;
                while !done.load(Ordering::Acquire) || observed == 0 {
                    let snapshot = router.snapshot();
                    assert!(snapshot.is_consistent(), "version {}", snapshot.version());
                    let clauses = snapshot.matchers().len();
                    assert_eq!(snapshot.document().runtime(), clauses == 2);

                    let kept = ids(&router.evaluate(&pool, &ctx).unwrap());
                    assert!(
                        kept == expected_a || kept == expected_b,
                        "mixed result {:?}",
                        kept
                    );

                    match router.route(&pool, &ctx).unwrap() {
                        RouteOutcome::PerCall => {}
                        RouteOutcome::Routed(buckets) => {
                            assert_eq!(ids(buckets.get("failover").unwrap()), expected_a)
                        }
                        RouteOutcome::NoDecision => panic!("rule is always valid"),
                    }
                    observed += 1;
                }
            });
        }

        scope.spawn(|| {
            for i in 0..INSTALLS {
                let rule = if i % 2 == 0 { hangzhou_only() } else { beijing_runtime() };
                router.install(Some(&rule)).unwrap();
            }
            done.store(true, Ordering::Release);
        });
    });

    // initial + explicit + INSTALLS
    assert_eq!(router.snapshot().version(), INSTALLS as u64 + 2);
    assert!(compiler.calls() > 0);
}

#[test]
fn versions_increase_with_concurrent_writers() {
    let router = Arc::new(
        ConditionRouter::new(RULE_KEY, Some(&hangzhou_only()), Arc::new(CountingCompiler::default()))
            .unwrap(),
    );

    std::thread::scope(|scope| {
        for writer in 0..4 {
            let router = &router;
            scope.spawn(move || {
                let mut last = 0;
                for i in 0..50 {
                    let rule = if (writer + i) % 2 == 0 { hangzhou_only() } else { beijing_runtime() };
                    let version = router.install(Some(&rule)).unwrap().version();
                    assert!(version > last);
                    last = version;
                }
            });
        }
    });

    assert_eq!(router.snapshot().version(), 1 + 4 * 50);
    assert!(router.snapshot().is_consistent());
}

#[test]
fn in_flight_snapshot_survives_replacement() {
    let router = ConditionRouter::new(RULE_KEY, Some(&hangzhou_only()), Arc::new(CountingCompiler::default()))
        .unwrap();
    let held = router.snapshot();

    router.install(Some(&beijing_runtime())).unwrap();

    assert_eq!(held.version(), 1);
    assert!(!held.document().runtime());
    assert_eq!(held.matchers().len(), 1);
    assert!(router.is_runtime());
}

#[test]
fn rejected_install_compiles_but_never_publishes() {
    let compiler = Arc::new(CountingCompiler::default());
    let router =
        ConditionRouter::new(RULE_KEY, Some(&hangzhou_only()), compiler.clone()).unwrap();
    assert_eq!(compiler.compiled(), 1);

    let bad = rule_yaml(&["=> region=beijing", "=> region=,"], true, true);
    assert!(router.install(Some(&bad)).is_err());

    assert_eq!(compiler.compiled(), 3);
    assert_eq!(router.snapshot().version(), 1);
    assert_eq!(
        ids(&router
            .evaluate(&two_region_pool(), &RequestContext::new())
            .unwrap()),
        vec!["A"]
    );

    // The next good install takes the next version
    assert_eq!(router.install(Some(&beijing_runtime())).unwrap().version(), 2);
}
