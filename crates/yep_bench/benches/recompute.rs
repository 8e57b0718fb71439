//! Computed field propagation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use yep_bench::utils::{populate_orders, random_name};
use yep_testkit::prelude::*;

/// Benchmark renaming a partner whose orders carry a label computed from
/// the partner's name.
fn bench_many2one_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("many2one_fan_out");

    for orders in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(*orders as u64));
        group.bench_with_input(BenchmarkId::from_parameter(orders), orders, |b, &orders| {
            let kit = TestEngine::sales();
            kit.execute_as(ADMIN, |env| {
                let partner = populate_orders(env, orders, 0)?;
                b.iter(|| {
                    partner.set("Name", black_box(random_name(8))).unwrap();
                });
                Ok(())
            })
            .unwrap();
        });
    }
    group.finish();
}

/// Benchmark changing a line price, which recomputes the line amount and
/// then its order's total.
fn bench_one2many_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("one2many_chain");

    for lines in [1usize, 10, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(lines), lines, |b, &lines| {
            let kit = TestEngine::sales();
            kit.execute_as(ADMIN, |env| {
                let partner = populate_orders(env, 1, lines)?;
                let order = partner.get_relation("Orders")?;
                let line = order.get_relation("Lines")?.first()?;
                let mut price = 1.0;
                b.iter(|| {
                    price += 1.0;
                    line.set("Price", black_box(price)).unwrap();
                });
                Ok(())
            })
            .unwrap();
        });
    }
    group.finish();
}

/// Benchmark writes that leave computed values unchanged.
fn bench_unchanged_recompute(c: &mut Criterion) {
    c.bench_function("unchanged_recompute", |b| {
        let kit = TestEngine::sales();
        kit.execute_as(ADMIN, |env| {
            let partner = populate_orders(env, 10, 0)?;
            let name = partner.get("Name")?;
            b.iter(|| {
                partner.set("Name", black_box(name.clone())).unwrap();
            });
            Ok(())
        })
        .unwrap();
    });
}

criterion_group!(
    benches,
    bench_many2one_fan_out,
    bench_one2many_chain,
    bench_unchanged_recompute
);
criterion_main!(benches);
