use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgentity::{BuildContext, Query, builder, compile_where};
use serde_json::{Value as Json, json};

/// `{or$: [{c0: 0}, {c1: {gte$: 1, lt$: 2}}, {c2: [2, 3, 4]}, ...]}` with `n` branches.
fn wide_or(n: usize) -> Json {
    let branches: Vec<Json> = (0..n)
        .map(|i| match i % 3 {
            0 => json!({ format!("c{i}"): i }),
            1 => json!({ format!("c{i}"): {"gte$": i, "lt$": i + 1} }),
            _ => json!({ format!("c{i}"): [i, i + 1, i + 2] }),
        })
        .collect();
    json!({ "or$": branches })
}

/// `and$` nested `depth` levels deep.
fn deep_and(depth: usize) -> Json {
    (0..depth).fold(json!({"leaf": 1}), |inner, i| {
        json!({ "and$": [inner, { format!("c{i}"): i }] })
    })
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/parse");

    for n in [1, 10, 100] {
        let q = wide_or(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &q, |b, q| {
            b.iter(|| black_box(Query::from_json(q).unwrap()));
        });
    }

    group.finish();
}

fn bench_compile_where(c: &mut Criterion) {
    let cx = BuildContext::default();
    let mut group = c.benchmark_group("compile/where");

    for n in [1, 10, 100] {
        let q = Query::from_json(&wide_or(n)).unwrap();
        group.bench_with_input(BenchmarkId::new("wide_or", n), &q, |b, q| {
            b.iter(|| black_box(compile_where(&q.clauses, &cx, 1).unwrap()));
        });
    }

    for depth in [4, 16, 64] {
        let q = Query::from_json(&deep_and(depth)).unwrap();
        group.bench_with_input(BenchmarkId::new("deep_and", depth), &q, |b, q| {
            b.iter(|| black_box(compile_where(&q.clauses, &cx, 1).unwrap()));
        });
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let cx = BuildContext::default();
    let q = Query::from_json(&json!({
        "price": {"gte$": 200},
        "or$": [{"name": "pear"}, {"name": {"in$": ["apple", "cherry"]}}],
        "sort$": {"price": 1},
        "limit$": 10,
        "fields$": ["name", "price"],
    }))
    .unwrap();

    c.bench_function("compile/select", |b| {
        b.iter(|| black_box(builder::select(&cx, "fruit", &q).unwrap()));
    });
}

criterion_group!(benches, bench_parse, bench_compile_where, bench_select);
criterion_main!(benches);
