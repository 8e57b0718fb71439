//! Test fixtures and engine helpers.
//!
//! [`TestEngine::sales`] builds a small sales schema exercising every kind
//! of field: plain, relational, stored computed (through one-to-many and
//! many-to-one paths), related, and a model for record rule tests.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use yep_core::methods::Super;
use yep_core::models::{Field, OnDelete, Registry};
use yep_core::{CoreResult, Engine, Environment, RecordSet, UserId};
use yep_store::MemoryStore;
use yep_value::{field_map, FieldMap, RecordId};

/// The superuser, member of `admin`.
pub const ADMIN: UserId = UserId::new(1);
/// A member of `sales`.
pub const SALESMAN: UserId = UserId::new(2);
/// A member of `sales_manager`, which inherits `sales`.
pub const MANAGER: UserId = UserId::new(3);
/// A user with no explicit group.
pub const GUEST: UserId = UserId::new(4);

/// Output of a compute method.
pub type Computed = (FieldMap, Vec<String>);

/// Records every compute method invocation.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<HashMap<String, Vec<RecordId>>>>,
}

impl CallLog {
    /// Records a call of `method` on `id`.
    pub fn record(&self, method: &str, id: RecordId) {
        self.calls.lock().entry(method.to_string()).or_default().push(id);
    }

    /// Records `method` was called on, in call order.
    #[must_use]
    pub fn calls(&self, method: &str) -> Vec<RecordId> {
        self.calls.lock().get(method).cloned().unwrap_or_default()
    }

    /// Number of calls of `method`.
    #[must_use]
    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().get(method).map_or(0, Vec::len)
    }

    /// Forgets every call.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// An engine over an in-memory store with a compute call log.
pub struct TestEngine {
    /// The engine.
    pub engine: Engine,
    /// Compute method invocations.
    pub calls: CallLog,
}

impl TestEngine {
    /// Bootstraps `registry` over a fresh in-memory store.
    pub fn open(registry: Registry, calls: CallLog) -> Self {
        let mut registry = registry;
        registry.bootstrap().expect("Failed to bootstrap registry");
        let engine =
            Engine::open(registry, Arc::new(MemoryStore::new())).expect("Failed to open engine");
        debug!(models = engine.registry().models().count(), "test engine opened");
        Self { engine, calls }
    }

    /// The sales schema with its groups and users.
    pub fn sales() -> Self {
        let calls = CallLog::default();
        let registry = sales_registry(&calls);
        Self::open(registry, calls)
    }

    /// Runs `f` as `uid` in a new transaction.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`; the transaction is rolled back then.
    pub fn execute_as<T, F>(&self, uid: UserId, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Environment) -> CoreResult<T>,
    {
        self.engine.execute(uid, f)
    }
}

impl std::ops::Deref for TestEngine {
    type Target = Engine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Runs a test with the sales engine.
pub fn with_sales_engine<F>(f: F)
where
    F: FnOnce(&TestEngine),
{
    crate::init_tracing();
    let kit = TestEngine::sales();
    f(&kit);
}

/// Builds the sales schema, logging compute calls into `calls`.
///
/// - `Company`: `Name`
/// - `Partner`: `Name`, `Email`, `Active`, `Company`, `Orders`, `Tags`, and
///   `NameLength` computed from `Name`
/// - `Tag`: `Name`, `Partners`
/// - `SaleOrder`: `Name`, `Partner`, `Lines`, the related `PartnerName`,
///   `PartnerLabel` computed from `Partner.Name` and `Total` computed from
///   `Lines.Amount`
/// - `SaleLine`: `Order` (cascade), `Product`, `Quantity`, `Price`, and
///   `Amount` computed from both
/// - `Document`: `Name`, `Active`, `Owner`, `Department`, for record rules
pub fn sales_registry(calls: &CallLog) -> Registry {
    let mut registry = Registry::new();
    let groups = registry.security().groups();
    groups.new_group("sales", "Sales", &[]).expect("Failed to create group");
    groups
        .new_group("sales_manager", "Sales Manager", &["sales"])
        .expect("Failed to create group");
    groups.add_membership(SALESMAN, "sales").expect("Failed to add membership");
    groups
        .add_membership(MANAGER, "sales_manager")
        .expect("Failed to add membership");

    let company = registry.new_model("Company").expect("Failed to declare Company");
    company
        .add_field(Field::char("Name"))
        .expect("Failed to add Company fields");

    let partner = registry.new_model("Partner").expect("Failed to declare Partner");
    partner
        .add_fields([
            Field::char("Name").required().index(),
            Field::char("Email").unique().no_copy(),
            Field::boolean("Active").default_value(true),
            Field::many2one("Company", "Company"),
            Field::one2many("Orders", "SaleOrder", "Partner"),
            Field::many2many("Tags", "Tag"),
            Field::integer("NameLength")
                .compute("ComputeNameLength")
                .depends(["Name"])
                .stored(),
        ])
        .expect("Failed to add Partner fields");
    let log = calls.clone();
    partner
        .create_method("ComputeNameLength", move |rs: &RecordSet, _: &Super<(), Computed>, ()| {
            log.record("ComputeNameLength", rs.ensure_one()?);
            let name = rs.get("Name")?;
            let len = i64::try_from(name.as_str()?.chars().count()).unwrap_or(i64::MAX);
            Ok((field_map! { "NameLength" => len }, Vec::new()))
        })
        .expect("Failed to declare ComputeNameLength");

    let tag = registry.new_model("Tag").expect("Failed to declare Tag");
    tag.add_fields([Field::char("Name"), Field::many2many("Partners", "Partner")])
        .expect("Failed to add Tag fields");

    let order = registry.new_model("SaleOrder").expect("Failed to declare SaleOrder");
    order
        .add_fields([
            Field::char("Name"),
            Field::many2one("Partner", "Partner"),
            Field::one2many("Lines", "SaleLine", "Order"),
            Field::char("PartnerName").related("Partner.Name"),
            Field::char("PartnerLabel")
                .compute("ComputePartnerLabel")
                .depends(["Partner.Name"])
                .stored(),
            Field::float("Total")
                .compute("ComputeTotal")
                .depends(["Lines.Amount"])
                .stored(),
        ])
        .expect("Failed to add SaleOrder fields");
    let log = calls.clone();
    order
        .create_method("ComputePartnerLabel", move |rs: &RecordSet, _: &Super<(), Computed>, ()| {
            log.record("ComputePartnerLabel", rs.ensure_one()?);
            let partner = rs.get_relation("Partner")?;
            if partner.is_empty() {
                return Ok((FieldMap::new(), vec!["PartnerLabel".to_string()]));
            }
            let label = format!("Customer: {}", partner.get("Name")?.as_str()?);
            Ok((field_map! { "PartnerLabel" => label }, Vec::new()))
        })
        .expect("Failed to declare ComputePartnerLabel");
    let log = calls.clone();
    order
        .create_method("ComputeTotal", move |rs: &RecordSet, _: &Super<(), Computed>, ()| {
            log.record("ComputeTotal", rs.ensure_one()?);
            let mut total = 0.0;
            for line in rs.get_relation("Lines")?.records() {
                total += line.get("Amount")?.as_f64()?;
            }
            Ok((field_map! { "Total" => total }, Vec::new()))
        })
        .expect("Failed to declare ComputeTotal");

    let line = registry.new_model("SaleLine").expect("Failed to declare SaleLine");
    line.add_fields([
        Field::many2one("Order", "SaleOrder").on_delete(OnDelete::Cascade),
        Field::char("Product"),
        Field::float("Quantity").default_value(1.0),
        Field::float("Price"),
        Field::float("Amount")
            .compute("ComputeAmount")
            .depends(["Quantity", "Price"])
            .stored(),
    ])
    .expect("Failed to add SaleLine fields");
    let log = calls.clone();
    line.create_method("ComputeAmount", move |rs: &RecordSet, _: &Super<(), Computed>, ()| {
        log.record("ComputeAmount", rs.ensure_one()?);
        let amount = rs.get("Quantity")?.as_f64()? * rs.get("Price")?.as_f64()?;
        Ok((field_map! { "Amount" => amount }, Vec::new()))
    })
    .expect("Failed to declare ComputeAmount");

    let document = registry.new_model("Document").expect("Failed to declare Document");
    document
        .add_fields([
            Field::char("Name"),
            Field::boolean("Active"),
            Field::integer("Owner"),
            Field::char("Department"),
        ])
        .expect("Failed to add Document fields");

    registry
}

/// Creates a partner as the superuser inside `env`'s transaction.
pub fn create_partner(env: &Environment, name: &str) -> CoreResult<RecordSet> {
    env.sudo().pool("Partner")?.create(field_map! { "Name" => name })
}

/// Creates an order with one line per `(quantity, price)`.
pub fn create_order(
    env: &Environment,
    partner: &RecordSet,
    lines: &[(f64, f64)],
) -> CoreResult<RecordSet> {
    let env = env.sudo();
    let order = env
        .pool("SaleOrder")?
        .create(field_map! { "Name" => "SO", "Partner" => partner.ensure_one()? })?;
    for (quantity, price) in lines {
        env.pool("SaleLine")?.create(field_map! {
            "Order" => order.ensure_one()?,
            "Quantity" => *quantity,
            "Price" => *price,
        })?;
    }
    Ok(order.with_env(partner.env().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yep_value::Value;

    #[test]
    fn sales_schema_bootstraps() {
        let kit = TestEngine::sales();
        let registry = kit.registry();
        for model in ["Company", "Partner", "Tag", "SaleOrder", "SaleLine", "Document", "PartnerTagRel"] {
            assert!(registry.get(model).is_some(), "missing {model}");
        }
        let groups = registry.security().groups();
        assert!(groups.user_groups(MANAGER).contains("sales"));
        assert!(!groups.user_groups(GUEST).contains("sales"));
    }

    #[test]
    fn order_totals_follow_lines() {
        with_sales_engine(|kit| {
            kit.execute_as(ADMIN, |env| {
                let jane = create_partner(env, "Jane")?;
                let order = create_order(env, &jane, &[(2.0, 10.0), (1.0, 5.5)])?;
                assert_eq!(order.get("Total")?, Value::Float(25.5));
                assert_eq!(jane.get("NameLength")?, Value::Integer(4));
                Ok(())
            })
            .unwrap();
        });
    }
}
