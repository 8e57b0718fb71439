//! Record rule filtering benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use yep_bench::utils::populate_documents;
use yep_core::security::RecordRule;
use yep_core::{Operand, Permission};
use yep_testkit::prelude::*;

fn restricted_engine() -> TestEngine {
    let kit = TestEngine::sales();
    let registry = kit.registry();
    registry
        .add_record_rule(
            "Document",
            RecordRule::global("active_only", Condition::eq("Active", true), Permission::READ),
        )
        .unwrap();
    registry
        .add_record_rule(
            "Document",
            RecordRule::for_group(
                "own_documents",
                "sales",
                Condition::with_operand("Owner", Operator::Equals, Operand::current_user()),
                Permission::READ,
            ),
        )
        .unwrap();
    registry
        .add_record_rule(
            "Document",
            RecordRule::for_group(
                "department_documents",
                "sales_manager",
                Condition::eq("Department", "Sales"),
                Permission::READ,
            ),
        )
        .unwrap();
    kit
}

/// Benchmark searching documents as users with different rule sets.
fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_search");

    for count in [100usize, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        for (name, uid) in [("sudo", ADMIN), ("owner", SALESMAN), ("manager", MANAGER)] {
            group.bench_with_input(BenchmarkId::new(name, count), count, |b, &count| {
                let kit = restricted_engine();
                kit.execute_as(uid, |env| {
                    populate_documents(env, count)?;
                    let pool = if uid == ADMIN {
                        env.sudo().pool("Document")?
                    } else {
                        env.pool("Document")?
                    };
                    b.iter(|| {
                        let found = pool.search(black_box(Condition::True)).unwrap();
                        black_box(found.len());
                    });
                    Ok(())
                })
                .unwrap();
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
