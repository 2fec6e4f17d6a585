//! Routing benchmarks.
//!
//! Run with: `cargo bench -p trellis-router`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use http::Method;
use trellis_router::{MethodRouter, Router};

fn build_router(num_routes: usize) -> Router<usize> {
    let mut router = Router::new();
    for i in 0..num_routes / 3 {
        router
            .insert(&format!("/api/v1/resource{i}"), MethodRouter::new().get(i))
            .unwrap();
        router
            .insert(&format!("/api/v1/resource{i}/{{id}}"), MethodRouter::new().get(i))
            .unwrap();
        router
            .insert(
                &format!("/api/v1/org/{{orgId}}/resource{i}/{{id}}"),
                MethodRouter::new().get(i),
            )
            .unwrap();
    }
    router
}

fn bench_match(c: &mut Criterion) {
    let router = build_router(300);

    c.bench_function("static_match", |b| {
        b.iter(|| black_box(router.match_route(&Method::GET, "/api/v1/resource50")));
    });
    c.bench_function("param_match", |b| {
        b.iter(|| black_box(router.match_route(&Method::GET, "/api/v1/resource25/12345")));
    });
    c.bench_function("nested_param_match", |b| {
        b.iter(|| {
            black_box(router.match_route(&Method::GET, "/api/v1/org/acme/resource75/999"));
        });
    });
    c.bench_function("method_not_allowed", |b| {
        b.iter(|| black_box(router.match_route(&Method::DELETE, "/api/v1/resource50")));
    });
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_count");
    for count in [30, 300, 3000] {
        let router = build_router(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &router, |b, router| {
            b.iter(|| black_box(router.match_route(&Method::GET, "/api/v1/resource5/42")));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_match, bench_scaling);
criterion_main!(benches);
