use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fexpr::{Context, Engine, FunctionRegistry, Value};

const SIMPLE: &str = "2 + 3 * 4";
const MIXED: &str = "2*(a+1) > 3 ? upper('yes') : lower('NO')";
const HEAVY: &str =
    "sum(1; 2; 3; 4; 5) * power(2; 8) + length('benchmarking') & '' == '3852' ? 1 : 0";

fn ctx_with_a() -> Context {
    let mut ctx = Context::new();
    ctx.set_global("a", Value::Number(3.0));
    ctx
}

fn bench_parse(c: &mut Criterion) {
    let engine = Engine::default();
    let mut g = c.benchmark_group("parse");
    g.bench_function("simple", |b| b.iter(|| engine.parse(black_box(SIMPLE))));
    g.bench_function("mixed", |b| b.iter(|| engine.parse(black_box(MIXED))));
    g.bench_function("heavy", |b| b.iter(|| engine.parse(black_box(HEAVY))));
    g.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let engine = Engine::default();
    let mut g = c.benchmark_group("evaluate");
    g.bench_function("simple", |b| {
        let mut ctx = Context::new();
        b.iter(|| engine.evaluate(black_box(SIMPLE), &mut ctx))
    });
    g.bench_function("mixed", |b| {
        let mut ctx = ctx_with_a();
        b.iter(|| engine.evaluate(black_box(MIXED), &mut ctx))
    });
    g.bench_function("heavy", |b| {
        let mut ctx = Context::new();
        b.iter(|| engine.evaluate(black_box(HEAVY), &mut ctx))
    });
    g.finish();
}

fn bench_catalog_build(c: &mut Criterion) {
    c.bench_function("standard_catalog_build", |b| {
        b.iter(FunctionRegistry::standard)
    });
}

criterion_group!(benches, bench_parse, bench_evaluate, bench_catalog_build);
criterion_main!(benches);
