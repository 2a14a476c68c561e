//! Benchmarks for condition routing latency with varying pool sizes and
//! clause counts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use condgate::{ClauseCompiler, ConditionRouter, Endpoint, Pool, RequestContext};
use std::sync::Arc;

const REGIONS: [&str; 4] = ["hangzhou", "beijing", "shanghai", "shenzhen"];

fn create_pool(size: usize) -> Pool {
    (0..size)
        .map(|i| {
            Arc::new(
                Endpoint::new(format!("ep-{}", i), format!("10.0.{}.{}", i / 250, i % 250 + 1), 20880)
                    .with_attribute("region", REGIONS[i % REGIONS.len()])
                    .with_attribute("version", if i % 3 == 0 { "2.0" } else { "1.0" }),
            )
        })
        .collect()
}

fn create_router(conditions: &[&str], runtime: bool) -> ConditionRouter {
    let mut rule = format!("runtime: {}\nconditions:\n", runtime);
    for condition in conditions {
        rule.push_str(&format!("  - \"{}\"\n", condition));
    }
    ConditionRouter::new("bench.condition-router", Some(&rule), Arc::new(ClauseCompiler))
        .expect("benchmark rule compiles")
}

fn caller() -> RequestContext {
    RequestContext::new()
        .with_method("findOrder")
        .with_argument("vip-1")
        .with_attribute("region", "hangzhou")
}

/// Single same-region clause over growing pools.
fn bench_route_by_pool_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_pool_size");
    let router = create_router(&["region=hangzhou => region=hangzhou"], false);
    let ctx = caller();

    for size in [4, 32, 256, 1024] {
        let pool = create_pool(size);
        group.bench_with_input(BenchmarkId::new("endpoints", size), &size, |b, _| {
            b.iter(|| black_box(router.route(&pool, &ctx).unwrap()));
        });
    }

    group.finish();
}

/// Fixed pool, growing clause list.
fn bench_evaluate_by_clause_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_clauses");
    let clauses = [
        "=> region != shenzhen",
        "method=findOrder & arguments[0]=vip* => version=2.0,1.0",
        "region=hangzhou => region=$region",
        "host=192.168.0.9 =>",
        "=> host=10.0.*",
        "region=beijing => region=beijing",
        "=> id=ep-*",
        "method=cancel* => version=2.0",
    ];
    let pool = create_pool(256);
    let ctx = caller();

    for count in [1, 2, 4, 8] {
        let router = create_router(&clauses[..count], true);
        group.bench_with_input(BenchmarkId::new("clauses", count), &count, |b, _| {
            b.iter(|| black_box(router.evaluate(&pool, &ctx).unwrap()));
        });
    }

    group.finish();
}

/// Cost of compiling and swapping in a new rule version.
fn bench_install(c: &mut Criterion) {
    let router = create_router(&["=> region=hangzhou"], false);
    let rule = "conditions:\n  - \"region=hangzhou => region=hangzhou\"\n  - \"=> version=2.0\"\n";

    c.bench_function("install_two_clause_rule", |b| {
        b.iter(|| black_box(router.install(Some(rule)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_route_by_pool_size,
    bench_evaluate_by_clause_count,
    bench_install,
);
criterion_main!(benches);
