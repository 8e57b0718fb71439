//! Benchmark utilities.

use rand::distributions::Alphanumeric;
use rand::Rng;
use yep_core::methods::Super;
use yep_core::{CoreResult, Environment, RecordSet};
use yep_testkit::prelude::*;

/// Generate a random name of `len` alphanumeric characters.
pub fn random_name(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// The sales engine with `depth` extension layers on a `Greet` method of
/// `Partner`, each calling through to the layer below.
pub fn layered_engine(depth: usize) -> TestEngine {
    let calls = CallLog::default();
    let registry = sales_registry(&calls);
    let partner = registry.must_get("Partner").expect("Failed to find Partner");
    partner
        .create_method("Greet", |rs: &RecordSet, _: &Super<(), usize>, ()| Ok(rs.len()))
        .expect("Failed to declare Greet");
    for _ in 0..depth {
        partner
            .extend_method("Greet", |rs: &RecordSet, sup: &Super<(), usize>, ()| {
                Ok(sup.call(rs, ())? + 1)
            })
            .expect("Failed to extend Greet");
    }
    partner.method("Greet").expect("Failed to find Greet").allow_group("sales", &[]);
    TestEngine::open(registry, calls)
}

/// Creates `count` documents with random activity, owner and department.
pub fn populate_documents(env: &Environment, count: usize) -> CoreResult<Vec<RecordId>> {
    let mut rng = rand::thread_rng();
    let pool = env.sudo().pool("Document")?;
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let department = if rng.gen_bool(0.3) { "Sales" } else { "Ops" };
        let doc = pool.create(field_map! {
            "Name" => random_name(12),
            "Active" => rng.gen_bool(0.8),
            "Owner" => rng.gen_range(1i64..=4),
            "Department" => department,
        })?;
        ids.push(doc.ensure_one()?);
    }
    Ok(ids)
}

/// Creates a partner with `orders` orders of `lines` random lines each.
pub fn populate_orders(env: &Environment, orders: usize, lines: usize) -> CoreResult<RecordSet> {
    let mut rng = rand::thread_rng();
    let partner = create_partner(env, &random_name(8))?;
    for _ in 0..orders {
        let amounts: Vec<(f64, f64)> = (0..lines)
            .map(|_| (f64::from(rng.gen_range(1u8..10)), rng.gen_range(1.0..100.0)))
            .collect();
        create_order(env, &partner, &amounts)?;
    }
    Ok(partner)
}
