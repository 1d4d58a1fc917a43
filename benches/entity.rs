//! Entity Resolution Benchmarks
//!
//! Measures root entity extraction over typical query shapes:
//! - Short single-table queries
//! - Queries with heavy comment blocks
//! - Derived-table sources that resolve to the complex-query label
//! - Long queries with no FROM clause

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use litehouse::resolve_entity;

fn bench_simple(c: &mut Criterion) {
    c.bench_function("resolve_simple", |b| {
        b.iter(|| resolve_entity(black_box("SELECT Id, Name FROM ACCOUNT WHERE Status = 'ACTIVE'")))
    });
}

fn bench_commented(c: &mut Criterion) {
    let query = format!(
        "{}\nSELECT Id\n/* {} */\nFROM invoice ORDER BY Id",
        "-- generated report\n".repeat(20),
        "FROM noise ".repeat(50)
    );

    c.bench_function("resolve_commented", |b| b.iter(|| resolve_entity(black_box(&query))));
}

fn bench_subquery(c: &mut Criterion) {
    c.bench_function("resolve_subquery", |b| {
        b.iter(|| {
            resolve_entity(black_box(
                "SELECT sub.Id FROM (SELECT Id FROM ACCOUNT WHERE Status = 'ACTIVE') sub",
            ))
        })
    });
}

fn bench_no_from(c: &mut Criterion) {
    let columns: Vec<String> = (0..500).map(|i| format!("{i} AS c{i}")).collect();
    let query = format!("SELECT {}", columns.join(", "));

    c.bench_function("resolve_no_from", |b| b.iter(|| resolve_entity(black_box(&query))));
}

criterion_group!(benches, bench_simple, bench_commented, bench_subquery, bench_no_from);
criterion_main!(benches);
