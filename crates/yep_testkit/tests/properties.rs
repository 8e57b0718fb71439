//! Integration tests for dependency propagation, method layering and
//! security enforcement.

use parking_lot::Mutex;
use std::sync::Arc;
use yep_core::methods::Super;
use yep_core::models::{Field, Registry};
use yep_core::security::RecordRule;
use yep_core::{Operand, Permission};
use yep_testkit::prelude::*;

#[test]
fn stored_compute_follows_many2one_path() {
    with_sales_engine(|kit| {
        kit.execute_as(ADMIN, |env| {
            let jane = create_partner(env, "Jane")?;
            let john = create_partner(env, "John")?;
            let jane_orders = create_order(env, &jane, &[])?.union(&create_order(env, &jane, &[])?)?;
            let john_order = create_order(env, &john, &[])?;
            assert_eq!(john_order.get("PartnerLabel")?, Value::Text("Customer: John".into()));

            kit.calls.clear();
            jane.set("Name", "Janet")?;

            let recomputed = kit.calls.calls("ComputePartnerLabel");
            assert_eq!(recomputed.len(), 2);
            assert!(recomputed.iter().all(|id| jane_orders.ids().contains(id)));
            for order in jane_orders.records() {
                assert_eq!(order.get("PartnerLabel")?, Value::Text("Customer: Janet".into()));
            }
            assert_eq!(john_order.get("PartnerLabel")?, Value::Text("Customer: John".into()));

            let found = env
                .pool("SaleOrder")?
                .search(Condition::eq("PartnerLabel", "Customer: Janet"))?;
            assert_eq!(found, jane_orders);
            Ok(())
        })
        .unwrap();
    });
}

#[test]
fn stored_compute_follows_one2many_path() {
    with_sales_engine(|kit| {
        kit.execute_as(ADMIN, |env| {
            let jane = create_partner(env, "Jane")?;
            let order = create_order(env, &jane, &[(2.0, 10.0), (3.0, 1.0)])?;
            let other = create_order(env, &jane, &[(1.0, 1.0)])?;
            assert_eq!(order.get("Total")?, Value::Float(23.0));

            let lines = order.get_relation("Lines")?;
            lines.first()?.set("Price", 20.0)?;
            assert_eq!(order.get("Total")?, Value::Float(43.0));

            // Moving a line recomputes both orders.
            lines.first()?.set("Order", other.ensure_one()?)?;
            assert_eq!(order.get("Total")?, Value::Float(3.0));
            assert_eq!(other.get("Total")?, Value::Float(41.0));

            other.get_relation("Lines")?.unlink()?;
            assert_eq!(other.get("Total")?, Value::Float(0.0));

            order.unlink()?;
            assert_eq!(env.pool("SaleLine")?.search_count(Condition::True)?, 0);
            Ok(())
        })
        .unwrap();
    });
}

#[test]
fn related_field_mirrors_current_value() {
    with_sales_engine(|kit| {
        kit.execute_as(ADMIN, |env| {
            let jane = create_partner(env, "Jane")?;
            let john = create_partner(env, "John")?;
            let order = create_order(env, &jane, &[])?;
            assert_eq!(order.get("PartnerName")?, Value::Text("Jane".into()));

            jane.set("Name", "Janet")?;
            assert_eq!(order.get("PartnerName")?, Value::Text("Janet".into()));

            order.set("Partner", john.ensure_one()?)?;
            assert_eq!(order.get("PartnerName")?, Value::Text("John".into()));

            order.set("PartnerName", "Johnny")?;
            assert_eq!(john.get("Name")?, Value::Text("Johnny".into()));

            order.set("Partner", Value::Null)?;
            assert_eq!(order.get("PartnerName")?, Value::Text(String::new()));
            assert_eq!(order.get("PartnerLabel")?, Value::Text(String::new()));
            Ok(())
        })
        .unwrap();
    });
}

#[test]
fn layers_run_top_down_with_call_through() {
    let calls = CallLog::default();
    let registry = sales_registry(&calls);
    let partner = registry.must_get("Partner").unwrap();
    let ran = Arc::new(Mutex::new(Vec::new()));
    let trace = ran.clone();
    partner
        .create_method("Greet", move |rs: &RecordSet, _: &Super<(), String>, ()| {
            trace.lock().push("L0");
            Ok(format!("Hello {}", rs.get("Name")?.as_str()?))
        })
        .unwrap();
    let trace = ran.clone();
    partner
        .extend_method("Greet", move |rs: &RecordSet, sup: &Super<(), String>, ()| {
            trace.lock().push("L1");
            Ok(format!("{}!", sup.call(rs, ())?))
        })
        .unwrap();
    let trace = ran.clone();
    partner
        .extend_method("Greet", move |rs: &RecordSet, sup: &Super<(), String>, ()| {
            trace.lock().push("L2");
            if rs.env().context().is_set("short") {
                return Ok("Hi".to_string());
            }
            sup.call(rs, ())
        })
        .unwrap();
    let kit = TestEngine::open(registry, calls);

    kit.execute_as(ADMIN, |env| {
        let jane = create_partner(env, "Jane")?;
        assert_eq!(jane.call::<(), String>("Greet", ())?, "Hello Jane!");
        assert_eq!(*ran.lock(), ["L2", "L1", "L0"]);

        ran.lock().clear();
        assert_eq!(jane.with_context("short", true).call::<(), String>("Greet", ())?, "Hi");
        assert_eq!(*ran.lock(), ["L2"]);
        Ok(())
    })
    .unwrap();
}

#[test]
fn execution_grant_conditioned_on_caller() {
    let calls = CallLog::default();
    let registry = sales_registry(&calls);
    let partner = registry.must_get("Partner").unwrap();
    partner
        .extend_method("Create", |rs: &RecordSet, sup: &Super<FieldMap, RecordSet>, values| {
            let created = sup.call(rs, values)?;
            created
                .with_env(rs.env().clone())
                .write(field_map! { "Email" => format!("{}@example.org", created.ensure_one()?) })?;
            Ok(created)
        })
        .unwrap();
    let create = partner.method("Create").unwrap();
    let write = partner.method("Write").unwrap();
    create.allow_group("sales", &[]);
    write.allow_group("sales", &[&*create]);
    let kit = TestEngine::open(registry, calls);

    let jane = kit
        .execute_as(SALESMAN, |env| {
            let jane = env.pool("Partner")?.create(field_map! { "Name" => "Jane" })?;
            assert_eq!(
                jane.get("Email")?,
                Value::Text(format!("{}@example.org", jane.ensure_one()?))
            );
            Ok(jane.ensure_one()?)
        })
        .unwrap();

    let err = kit
        .execute_as(SALESMAN, |env| {
            env.pool("Partner")?.browse([jane]).set("Name", "Janet")
        })
        .unwrap_err();
    assert!(err.is_access_denied());

    let err = kit
        .execute_as(GUEST, |env| env.pool("Partner")?.create(field_map! { "Name" => "Ghost" }))
        .unwrap_err();
    assert!(matches!(err, CoreError::AccessDenied { .. }));

    kit.execute_as(SALESMAN, |env| {
        env.sudo().pool("Partner")?.browse([jane]).set("Name", "Janet")
    })
    .unwrap();
    kit.execute_as(ADMIN, |env| env.pool("Partner")?.browse([jane]).set("Name", "Jan"))
        .unwrap();

    write.revoke_group("sales");
    let err = kit
        .execute_as(SALESMAN, |env| env.pool("Partner")?.create(field_map! { "Name" => "Bob" }))
        .unwrap_err();
    assert!(err.is_access_denied());
}

#[test]
fn record_rules_combine_globally_and_by_group() {
    with_sales_engine(|kit| {
        let registry = kit.registry();
        let groups = registry.security().groups();
        groups.new_group("owners", "Owners", &[]).unwrap();
        groups.new_group("sales_dept", "Sales Department", &[]).unwrap();
        let both = UserId::new(10);
        let owner_only = UserId::new(11);
        let neither = UserId::new(12);
        groups.add_membership(both, "owners").unwrap();
        groups.add_membership(both, "sales_dept").unwrap();
        groups.add_membership(owner_only, "owners").unwrap();

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
                    "owners",
                    Condition::with_operand("Owner", Operator::Equals, Operand::current_user()),
                    Permission::READ,
                ),
            )
            .unwrap();
        registry
            .add_record_rule(
                "Document",
                RecordRule::for_group(
                    "sales_documents",
                    "sales_dept",
                    Condition::eq("Department", "Sales"),
                    Permission::READ,
                ),
            )
            .unwrap();

        let docs = kit
            .execute_as(ADMIN, |env| {
                let pool = env.sudo().pool("Document")?;
                let mut ids = Vec::new();
                for (name, active, owner, dept) in [
                    ("mine", true, both, "Ops"),
                    ("sales", true, UserId::new(99), "Sales"),
                    ("archived", false, both, "Sales"),
                    ("other", true, UserId::new(99), "Ops"),
                    ("owned", true, owner_only, "Ops"),
                ] {
                    let doc = pool.create(field_map! {
                        "Name" => name,
                        "Active" => active,
                        "Owner" => owner.as_i64(),
                        "Department" => dept,
                    })?;
                    ids.push(doc.ensure_one()?);
                }
                Ok(ids)
            })
            .unwrap();

        let visible = |uid: UserId| -> Vec<RecordId> {
            kit.execute_as(uid, |env| Ok(env.pool("Document")?.search_all()?.ids().to_vec()))
                .unwrap()
        };
        assert_eq!(visible(both), [docs[0], docs[1]]);
        assert_eq!(visible(owner_only), [docs[4]]);
        assert!(visible(neither).is_empty());

        kit.execute_as(both, |env| {
            let archived = env.pool("Document")?.browse([docs[2]]);
            assert!(matches!(
                archived.get("Name"),
                Err(CoreError::RecordAccessDenied { .. })
            ));
            assert_eq!(archived.sudo().get("Name")?, Value::Text("archived".into()));
            Ok(())
        })
        .unwrap();

        assert!(registry.remove_record_rule("Document", "active_only"));
        assert_eq!(visible(both), [docs[0], docs[1], docs[2]]);
    });
}

#[test]
fn field_access_masks_reads_and_drops_writes() {
    with_sales_engine(|kit| {
        let partner = kit.registry().must_get("Partner").unwrap();
        for method in ["Create", "Write"] {
            partner.method(method).unwrap().allow_group("sales", &[]);
        }
        partner
            .field("Email")
            .unwrap()
            .revoke_access("sales", Permission::ALL);

        let jane = kit
            .execute_as(ADMIN, |env| {
                let jane = env
                    .pool("Partner")?
                    .create(field_map! { "Name" => "Jane", "Email" => "jane@example.org" })?;
                jane.ensure_one()
            })
            .unwrap();

        kit.execute_as(SALESMAN, |env| {
            let rec = env.pool("Partner")?.browse([jane]);
            assert_eq!(rec.get("Email")?, Value::Text(String::new()));
            assert_eq!(rec.read(&["Email"])?[0].get("Email"), Some(&Value::Text(String::new())));
            rec.write(field_map! { "Email" => "spam@example.org", "Name" => "Janet" })?;
            Ok(())
        })
        .unwrap();

        kit.execute_as(ADMIN, |env| {
            let rec = env.pool("Partner")?.browse([jane]);
            assert_eq!(rec.get("Email")?, Value::Text("jane@example.org".into()));
            assert_eq!(rec.get("Name")?, Value::Text("Janet".into()));
            rec.set("Email", "new@example.org")?;
            assert_eq!(rec.get("Email")?, Value::Text("new@example.org".into()));
            Ok(())
        })
        .unwrap();

        kit.execute_as(MANAGER, |env| {
            let rec = env.pool("Partner")?.browse([jane]);
            assert_eq!(rec.get("Email")?, Value::Text(String::new()));
            Ok(())
        })
        .unwrap();
    });
}

#[test]
fn unchanged_recomputation_does_not_write() {
    with_sales_engine(|kit| {
        let jane = kit
            .execute_as(ADMIN, |env| create_partner(env, "Jane")?.ensure_one())
            .unwrap();
        kit.calls.clear();

        let before = kit.stats();
        kit.execute_as(ADMIN, |env| {
            env.pool("Partner")?.browse([jane]).set("Name", "Joanna")
        })
        .unwrap();
        let first = kit.stats();
        assert_eq!(kit.calls.count("ComputeNameLength"), 1);
        assert_eq!(first.writes() - before.writes(), 2);

        kit.execute_as(ADMIN, |env| {
            env.pool("Partner")?.browse([jane]).set("Name", "Joanna")
        })
        .unwrap();
        let second = kit.stats();
        assert_eq!(kit.calls.count("ComputeNameLength"), 2);
        assert_eq!(second.writes() - first.writes(), 1);

        let length = kit
            .execute_as(ADMIN, |env| env.pool("Partner")?.browse([jane]).get("NameLength"))
            .unwrap();
        assert_eq!(length, Value::Integer(6));
    });
}

#[test]
fn stored_compute_follows_many2many_path() {
    let calls = CallLog::default();
    let registry = sales_registry(&calls);
    let partner = registry.must_get("Partner").unwrap();
    partner
        .add_field(
            Field::char("TagNames")
                .compute("ComputeTagNames")
                .depends(["Tags.Name"])
                .stored(),
        )
        .unwrap();
    let log = calls.clone();
    partner
        .create_method("ComputeTagNames", move |rs: &RecordSet, _: &Super<(), Computed>, ()| {
            log.record("ComputeTagNames", rs.ensure_one()?);
            let mut names = Vec::new();
            for tag in rs.get_relation("Tags")?.records() {
                names.push(tag.get("Name")?.as_str()?.to_string());
            }
            names.sort_unstable();
            Ok((field_map! { "TagNames" => names.join(",") }, Vec::new()))
        })
        .unwrap();
    let kit = TestEngine::open(registry, calls);

    kit.execute_as(ADMIN, |env| {
        let jane = create_partner(env, "Jane")?;
        let john = create_partner(env, "John")?;
        let tags = env.pool("Tag")?;
        let vip = tags.create(field_map! { "Name" => "vip" })?;
        jane.set("Tags", vec![vip.ensure_one()?])?;
        assert_eq!(jane.get("TagNames")?, Value::Text("vip".into()));

        kit.calls.clear();
        vip.set("Name", "gold")?;
        assert_eq!(kit.calls.calls("ComputeTagNames"), [jane.ensure_one()?]);
        assert_eq!(jane.get("TagNames")?, Value::Text("gold".into()));
        assert_eq!(john.get("TagNames")?, Value::Text(String::new()));

        let new = tags.create(field_map! { "Name" => "new" })?;
        new.set("Partners", vec![jane.ensure_one()?])?;
        assert_eq!(jane.get("TagNames")?, Value::Text("gold,new".into()));

        let found = env
            .pool("Partner")?
            .search(Condition::eq("TagNames", "gold,new"))?;
        assert_eq!(found, jane);
        Ok(())
    })
    .unwrap();
}

#[test]
fn bootstrap_rejects_cycles_and_bad_compute_methods() {
    let mut registry = Registry::new();
    let model = registry.new_model("Loop").unwrap();
    model
        .add_fields([
            Field::integer("A").compute("ComputeA").depends(["B"]).stored(),
            Field::integer("B").compute("ComputeB").depends(["A"]).stored(),
        ])
        .unwrap();
    for name in ["ComputeA", "ComputeB"] {
        model
            .create_method(name, |_: &RecordSet, _: &Super<(), (FieldMap, Vec<String>)>, ()| {
                Ok((FieldMap::new(), Vec::new()))
            })
            .unwrap();
    }
    assert!(matches!(registry.bootstrap(), Err(CoreError::DependencyCycle { .. })));

    let mut registry = Registry::new();
    let model = registry.new_model("Bad").unwrap();
    model
        .add_field(Field::integer("A").compute("ComputeA").stored())
        .unwrap();
    model
        .create_method("ComputeA", |_: &RecordSet, _: &Super<(), FieldMap>, ()| Ok(FieldMap::new()))
        .unwrap();
    assert!(matches!(
        registry.bootstrap(),
        Err(CoreError::InvalidComputeMethod { .. })
    ));
}
