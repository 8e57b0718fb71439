//! Record sets.

mod access;
mod compute;
mod crud;
mod eval;

pub(crate) use crud::{create_records, default_values, unlink_records, write_records};

use access::{exists, raw_value};
use eval::search_ids;

use crate::condition::Condition;
use crate::env::{Context, Environment};
use crate::error::{CoreError, CoreResult};
use crate::methods::{Method, NameSearchParams};
use crate::models::Model;
use crate::security::{Permission, UserId};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use yep_value::{FieldMap, RecordId, Value};

/// An ordered set of records of one model, bound to an environment.
///
/// Record sets are values: every operation returns a new set and leaves
/// the receiver untouched. Field values are loaded lazily into the
/// transaction's cache.
#[derive(Clone)]
pub struct RecordSet {
    env: Environment,
    model: Arc<Model>,
    ids: Vec<RecordId>,
    query: Option<Condition>,
}

impl RecordSet {
    pub(crate) fn new(env: Environment, model: Arc<Model>, ids: Vec<RecordId>) -> Self {
        Self {
            env,
            model,
            ids,
            query: None,
        }
    }

    /// The environment.
    #[must_use]
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// The model.
    #[must_use]
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// The model name.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Record ids, in order.
    #[must_use]
    pub fn ids(&self) -> &[RecordId] {
        &self.ids
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if the set has no record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The condition this set was searched with, if any.
    #[must_use]
    pub fn query(&self) -> Option<&Condition> {
        self.query.as_ref()
    }

    /// Returns the id of a singleton.
    ///
    /// # Errors
    ///
    /// Returns `NotSingleton` unless the set has exactly one record.
    pub fn ensure_one(&self) -> CoreResult<RecordId> {
        match self.ids.as_slice() {
            [id] => Ok(*id),
            ids => Err(CoreError::NotSingleton {
                model: self.model.name().to_string(),
                len: ids.len(),
            }),
        }
    }

    /// The first record.
    ///
    /// # Errors
    ///
    /// Returns `EmptyRecordSet` on an empty set.
    pub fn first(&self) -> CoreResult<RecordSet> {
        let id = self
            .ids
            .first()
            .ok_or_else(|| CoreError::empty_record_set(self.model.name(), "first"))?;
        Ok(self.derive(vec![*id]))
    }

    /// Singleton sets of every record, in order.
    pub fn records(&self) -> impl Iterator<Item = RecordSet> + '_ {
        self.ids.iter().map(|id| self.derive(vec![*id]))
    }

    /// A set of the same model with the given ids, duplicates removed.
    #[must_use]
    pub fn browse(&self, ids: impl IntoIterator<Item = RecordId>) -> RecordSet {
        let mut seen = HashSet::new();
        let ids = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        self.derive(ids)
    }

    /// The records matching `cond`, in id order.
    ///
    /// Read record rules are applied unless the environment is sudo.
    ///
    /// # Errors
    ///
    /// Fails on unresolvable paths and store errors.
    pub fn search(&self, cond: Condition) -> CoreResult<RecordSet> {
        let ids = search_ids(&self.env, &self.model, &cond)?;
        trace!(model = %self.model.name(), found = ids.len(), "search");
        let mut rs = self.derive(ids);
        rs.query = Some(cond);
        Ok(rs)
    }

    /// Every readable record of the model.
    ///
    /// # Errors
    ///
    /// See [`RecordSet::search`].
    pub fn search_all(&self) -> CoreResult<RecordSet> {
        self.search(Condition::True)
    }

    /// Number of records matching `cond`.
    ///
    /// # Errors
    ///
    /// See [`RecordSet::search`].
    pub fn search_count(&self, cond: Condition) -> CoreResult<usize> {
        Ok(search_ids(&self.env, &self.model, &cond)?.len())
    }

    /// Loads the rows of every record into the cache.
    ///
    /// A searched set runs its query again. Other sets drop the ids that no
    /// longer exist or that read rules hide.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn fetch(&self) -> CoreResult<RecordSet> {
        if let Some(cond) = &self.query {
            return self.search(cond.clone());
        }
        let mut ids = Vec::with_capacity(self.ids.len());
        for id in &self.ids {
            if exists(&self.env, &self.model, *id)? {
                ids.push(*id);
            }
        }
        let ids = eval::narrow(&self.env, &self.model, ids, Permission::READ)?;
        Ok(self.derive(ids))
    }

    /// The first `n` records.
    #[must_use]
    pub fn limit(&self, n: usize) -> RecordSet {
        self.derive(self.ids.iter().take(n).copied().collect())
    }

    /// The records for which `pred` holds.
    ///
    /// # Errors
    ///
    /// Propagates the predicate's error.
    pub fn filtered<F>(&self, pred: F) -> CoreResult<RecordSet>
    where
        F: Fn(&RecordSet) -> CoreResult<bool>,
    {
        let mut ids = Vec::new();
        for rec in self.records() {
            if pred(&rec)? {
                ids.push(rec.ids[0]);
            }
        }
        Ok(self.derive(ids))
    }

    /// The records sorted by a key. The sort is not stable.
    ///
    /// # Errors
    ///
    /// Propagates the key function's error.
    pub fn sorted_by<F>(&self, key: F) -> CoreResult<RecordSet>
    where
        F: Fn(&RecordSet) -> CoreResult<Value>,
    {
        let mut keyed = Vec::with_capacity(self.ids.len());
        for rec in self.records() {
            keyed.push((key(&rec)?, rec.ids[0]));
        }
        keyed.sort_unstable_by(|a, b| a.0.compare(&b.0).unwrap_or(Ordering::Equal));
        Ok(self.derive(keyed.into_iter().map(|(_, id)| id).collect()))
    }

    /// Records of either set, receiver first.
    ///
    /// # Errors
    ///
    /// Returns `ModelMismatch` for sets of different models.
    pub fn union(&self, other: &RecordSet) -> CoreResult<RecordSet> {
        self.check_same_model(other)?;
        Ok(self.browse(self.ids.iter().chain(&other.ids).copied()))
    }

    /// Records of the receiver also in `other`.
    ///
    /// # Errors
    ///
    /// Returns `ModelMismatch` for sets of different models.
    pub fn intersect(&self, other: &RecordSet) -> CoreResult<RecordSet> {
        self.check_same_model(other)?;
        let keep: HashSet<_> = other.ids.iter().collect();
        Ok(self.browse(self.ids.iter().filter(|id| keep.contains(id)).copied()))
    }

    /// Records of the receiver not in `other`.
    ///
    /// # Errors
    ///
    /// Returns `ModelMismatch` for sets of different models.
    pub fn subtract(&self, other: &RecordSet) -> CoreResult<RecordSet> {
        self.check_same_model(other)?;
        let drop: HashSet<_> = other.ids.iter().collect();
        Ok(self.browse(self.ids.iter().filter(|id| !drop.contains(id)).copied()))
    }

    /// The same records in another environment.
    #[must_use]
    pub fn with_env(&self, env: Environment) -> RecordSet {
        RecordSet {
            env,
            ..self.clone()
        }
    }

    /// The same records with one more context value.
    #[must_use]
    pub fn with_context(&self, key: impl Into<String>, value: impl Into<Value>) -> RecordSet {
        self.with_env(self.env.with_context(key, value))
    }

    /// The same records with the context replaced.
    #[must_use]
    pub fn with_new_context(&self, context: Context) -> RecordSet {
        self.with_env(self.env.with_new_context(context))
    }

    /// The same records with security bypassed.
    #[must_use]
    pub fn sudo(&self) -> RecordSet {
        self.with_env(self.env.sudo())
    }

    /// The same records acting as `uid` with security bypassed.
    #[must_use]
    pub fn sudo_as(&self, uid: UserId) -> RecordSet {
        self.with_env(self.env.sudo_as(uid))
    }

    /// Calls a method of the model on this set.
    ///
    /// Unless the environment is sudo, the current user must be allowed to
    /// execute the method when called from the current caller. The method
    /// then runs with itself pushed as the caller of nested calls.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMethod`, `SignatureMismatch` or `AccessDenied`, or
    /// the error of the method itself.
    pub fn call<A: 'static, R: 'static>(&self, method: &str, args: A) -> CoreResult<R> {
        let method = self.model.method(method)?;
        if !self.env.is_sudo() {
            self.check_execution(&method)?;
        }
        trace!(
            model = %self.model.name(),
            method = method.name(),
            uid = %self.env.uid(),
            sudo = self.env.is_sudo(),
            "dispatch"
        );
        let rs = self.with_env(self.env.push_frame(method.caller_ref()));
        method.invoke(&rs, args)
    }

    fn check_execution(&self, method: &Method) -> CoreResult<()> {
        let groups = self.env.user_groups();
        let admin = &self.env.config().admin_group;
        if method.acl().is_allowed(&groups, admin, self.env.caller()) {
            return Ok(());
        }
        Err(CoreError::access_denied(
            self.model.name(),
            method.name(),
            self.env.uid(),
        ))
    }

    /// The value of a field of a singleton.
    ///
    /// Fields the user may not read yield their zero value.
    ///
    /// # Errors
    ///
    /// Returns `NotSingleton`, `UnknownField`, `RecordAccessDenied` when
    /// read rules hide the record, or `MissingRecord`.
    pub fn get(&self, field: &str) -> CoreResult<Value> {
        let id = self.ensure_one()?;
        let field = self.model.field(field)?;
        if !self.env.is_sudo() {
            if eval::narrow(&self.env, &self.model, vec![id], Permission::READ)?.is_empty() {
                return Err(CoreError::RecordAccessDenied {
                    model: self.model.name().to_string(),
                    id,
                    perm: Permission::READ,
                });
            }
            if !access::field_permission(&self.env, &field).contains(Permission::READ) {
                return Ok(field.zero_value());
            }
        }
        raw_value(&self.env, &self.model, id, &field)
    }

    /// The records a relation field of a singleton points to.
    ///
    /// # Errors
    ///
    /// See [`RecordSet::get`]; also fails if the field is not a relation.
    pub fn get_relation(&self, field: &str) -> CoreResult<RecordSet> {
        let descriptor = self.model.field(field)?;
        let target = descriptor
            .relation_model()
            .ok_or_else(|| CoreError::invalid_value(self.model.name(), field, "not a relation field"))?;
        let target = self.env.registry().must_get(target)?;
        let ids = self.get(field)?.as_ids();
        Ok(RecordSet::new(self.env.clone(), target, ids))
    }

    /// Sets a field on every record.
    ///
    /// # Errors
    ///
    /// Returns `EmptyRecordSet` on an empty set, otherwise see
    /// [`RecordSet::write`].
    pub fn set(&self, field: &str, value: impl Into<Value>) -> CoreResult<()> {
        if self.is_empty() {
            return Err(CoreError::empty_record_set(self.model.name(), "set"));
        }
        let mut values = FieldMap::new();
        values.insert(field, value);
        self.write(values)
    }

    /// Reads fields of every record, all fields when `fields` is empty.
    ///
    /// Records hidden by read rules are skipped and unreadable fields yield
    /// their zero value.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` or store errors.
    pub fn read(&self, fields: &[&str]) -> CoreResult<Vec<FieldMap>> {
        let descriptors = if fields.is_empty() {
            self.model.fields().all()
        } else {
            fields
                .iter()
                .map(|f| self.model.field(f))
                .collect::<CoreResult<Vec<_>>>()?
        };
        let visible = self.fetch()?;
        let mut rows = Vec::with_capacity(visible.len());
        for id in &visible.ids {
            let mut row = FieldMap::new();
            for field in &descriptors {
                let readable = self.env.is_sudo()
                    || access::field_permission(&self.env, field).contains(Permission::READ);
                let value = if readable {
                    raw_value(&self.env, &self.model, *id, field)?
                } else {
                    field.zero_value()
                };
                row.insert(field.name(), value);
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Creates a record of the model through the `Create` method.
    ///
    /// # Errors
    ///
    /// See [`RecordSet::call`].
    pub fn create(&self, values: FieldMap) -> CoreResult<RecordSet> {
        self.call("Create", values)
    }

    /// Updates every record through the `Write` method.
    ///
    /// # Errors
    ///
    /// See [`RecordSet::call`].
    pub fn write(&self, values: FieldMap) -> CoreResult<()> {
        self.call("Write", values)
    }

    /// Deletes every record through the `Unlink` method and returns how
    /// many were deleted.
    ///
    /// # Errors
    ///
    /// See [`RecordSet::call`].
    pub fn unlink(&self) -> CoreResult<usize> {
        self.call("Unlink", ())
    }

    /// Duplicates a singleton through the `Copy` method.
    ///
    /// # Errors
    ///
    /// See [`RecordSet::call`].
    pub fn copy(&self, overrides: FieldMap) -> CoreResult<RecordSet> {
        self.call("Copy", overrides)
    }

    /// Display name of a singleton through the `NameGet` method.
    ///
    /// # Errors
    ///
    /// See [`RecordSet::call`].
    pub fn name_get(&self) -> CoreResult<String> {
        self.call("NameGet", ())
    }

    /// Searches records by display name through the `NameSearch` method.
    ///
    /// # Errors
    ///
    /// See [`RecordSet::call`].
    pub fn name_search(&self, params: NameSearchParams) -> CoreResult<RecordSet> {
        self.call("NameSearch", params)
    }

    /// Default values of the model through the `DefaultGet` method.
    ///
    /// # Errors
    ///
    /// See [`RecordSet::call`].
    pub fn default_get(&self) -> CoreResult<FieldMap> {
        self.call("DefaultGet", ())
    }

    fn derive(&self, ids: Vec<RecordId>) -> RecordSet {
        RecordSet::new(self.env.clone(), Arc::clone(&self.model), ids)
    }

    fn check_same_model(&self, other: &RecordSet) -> CoreResult<()> {
        if self.model.name() == other.model.name() {
            return Ok(());
        }
        Err(CoreError::ModelMismatch {
            left: self.model.name().to_string(),
            right: other.model.name().to_string(),
        })
    }
}

impl fmt::Debug for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.model.name(), self.ids)
    }
}

impl PartialEq for RecordSet {
    fn eq(&self, other: &Self) -> bool {
        self.model.name() == other.model.name() && self.ids == other.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::Super;
    use crate::models::{Field, OnDelete, Registry};
    use crate::{Engine, Operator};
    use yep_store::MemoryStore;
    use yep_value::field_map;

    const ADMIN: UserId = UserId::new(1);

    fn engine_with(extend: impl FnOnce(&Registry)) -> Engine {
        let mut registry = Registry::new();
        registry.new_model("Tag").unwrap().add_field(Field::char("Name")).unwrap();
        registry
            .new_model("Partner")
            .unwrap()
            .add_fields([
                Field::char("Name").required(),
                Field::integer("Age").default_value(18),
                Field::char("Email").unique().no_copy(),
                Field::many2one("Parent", "Partner"),
                Field::one2many("Children", "Partner", "Parent"),
                Field::many2many("Tags", "Tag"),
            ])
            .unwrap();
        registry
            .new_model("Invoice")
            .unwrap()
            .add_field(Field::many2one("Partner", "Partner").on_delete(OnDelete::Restrict))
            .unwrap();
        extend(&registry);
        registry.bootstrap().unwrap();
        Engine::open(registry, Arc::new(MemoryStore::new())).unwrap()
    }

    fn engine() -> Engine {
        engine_with(|_| {})
    }

    fn partner(env: &Environment, name: &str, age: i64) -> RecordSet {
        env.pool("Partner")
            .unwrap()
            .create(field_map! { "Name" => name, "Age" => age })
            .unwrap()
    }

    #[test]
    fn search_and_set_algebra() {
        engine()
            .execute(ADMIN, |env| {
                let ann = partner(env, "Ann", 30);
                let bob = partner(env, "Bob", 15);
                let cid = partner(env, "Cid", 45);
                let pool = env.pool("Partner")?;

                let adults = pool.search(Condition::new("Age", Operator::GreaterOrEqual, 18))?;
                assert_eq!(adults, ann.union(&cid)?);
                assert!(adults.query().is_some());
                assert_eq!(pool.search_count(Condition::new("Name", Operator::ILike, "%i%"))?, 1);

                let all = pool.search_all()?;
                assert_eq!(all.len(), 3);
                assert_eq!(all.subtract(&adults)?, bob);
                assert_eq!(all.intersect(&bob)?, bob);
                assert_eq!(all.limit(2).len(), 2);

                let by_age = all.sorted_by(|r| r.get("Age"))?;
                assert_eq!(by_age.ids(), [bob.ids()[0], ann.ids()[0], cid.ids()[0]]);
                let young = all.filtered(|r| Ok(r.get("Age")?.as_i64()? < 40))?;
                assert_eq!(young.len(), 2);
                assert_eq!(all.browse([cid.ids()[0], cid.ids()[0]]).len(), 1);

                let tags = env.pool("Tag")?;
                assert!(matches!(all.union(&tags), Err(CoreError::ModelMismatch { .. })));
                assert!(matches!(all.ensure_one(), Err(CoreError::NotSingleton { len: 3, .. })));
                assert!(matches!(tags.first(), Err(CoreError::EmptyRecordSet { .. })));
                assert!(matches!(
                    tags.set("Name", "ghost"),
                    Err(CoreError::EmptyRecordSet { .. })
                ));
                tags.write(field_map! { "Name" => "ghost" })?;
                assert_eq!(tags.search_count(Condition::True)?, 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn relations_read_and_write() {
        engine()
            .execute(ADMIN, |env| {
                let parent = partner(env, "Parent", 50);
                let child = env.pool("Partner")?.create(field_map! {
                    "name" => "Child",
                    "parent_id" => parent.ids()[0],
                })?;
                assert_eq!(parent.get("Children")?, Value::Ids(child.ids().to_vec()));
                assert_eq!(child.get_relation("Parent")?, parent);

                let vip = env.pool("Tag")?.create(field_map! { "Name" => "vip" })?;
                let new = env.pool("Tag")?.create(field_map! { "Name" => "new" })?;
                child.set("Tags", vec![vip.ids()[0], new.ids()[0]])?;
                let pool = env.pool("Partner")?;
                assert_eq!(pool.search(Condition::eq("Tags.Name", "vip"))?, child);
                assert_eq!(pool.search(Condition::eq("Parent.Name", "Parent"))?, child);
                assert_eq!(pool.search(Condition::eq("Children.Name", "Child"))?, parent);

                child.set("Tags", vec![new.ids()[0]])?;
                assert!(pool.search(Condition::eq("Tags.Name", "vip"))?.is_empty());
                assert_eq!(env.pool("PartnerTagRel")?.search_count(Condition::True)?, 1);

                parent.set("Children", Vec::<RecordId>::new())?;
                assert_eq!(child.get("Parent")?, Value::Null);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn layers_call_through() {
        let engine = engine_with(|registry| {
            let partner = registry.must_get("Partner").unwrap();
            partner
                .create_method("Greet", |rs: &RecordSet, sup: &Super<String, String>, greeting| {
                    assert!(!sup.has_next());
                    Ok(format!("{greeting} {}", rs.name_get()?))
                })
                .unwrap();
            partner
                .extend_method("Greet", |rs: &RecordSet, sup: &Super<String, String>, greeting| {
                    Ok(format!("{}!", sup.call(rs, greeting)?))
                })
                .unwrap();
            partner
                .create_method("Walk", |_: &RecordSet, _: &Super<i64, String>, n: i64| {
                    Ok(format!("L0({n})"))
                })
                .unwrap();
            partner
                .extend_method("Walk", |rs: &RecordSet, sup: &Super<i64, String>, n: i64| {
                    let inner = if n > 0 {
                        rs.call::<i64, String>("Walk", n - 1)?
                    } else {
                        String::new()
                    };
                    Ok(format!("L1({n})[{inner}]{}", sup.call(rs, n)?))
                })
                .unwrap();
            partner
                .create_method("Lonely", |rs: &RecordSet, sup: &Super<(), ()>, ()| sup.call(rs, ()))
                .unwrap();
        });
        engine
            .execute(ADMIN, |env| {
                let ann = partner(env, "Ann", 30);
                assert_eq!(ann.call::<String, String>("Greet", "Hello".into())?, "Hello Ann!");
                assert_eq!(ann.model().method("Greet")?.layer_count(), 2);
                assert!(matches!(
                    ann.call::<(), String>("Greet", ()),
                    Err(CoreError::SignatureMismatch { .. })
                ));
                assert_eq!(
                    ann.call::<i64, String>("Walk", 2)?,
                    "L1(2)[L1(1)[L1(0)[]L0(0)]L0(1)]L0(2)"
                );
                assert!(matches!(ann.call::<(), ()>("Lonely", ()), Err(CoreError::NoSuperLayer { .. })));
                assert!(matches!(ann.call::<(), ()>("Missing", ()), Err(CoreError::UnknownMethod { .. })));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn data_checks() {
        let engine = engine();
        let err = engine
            .execute(ADMIN, |env| env.pool("Partner")?.create(field_map! { "Age" => 3 }))
            .unwrap_err();
        assert!(matches!(err, CoreError::RequiredField { .. }));

        let err = engine
            .execute(ADMIN, |env| {
                let pool = env.pool("Partner")?;
                pool.create(field_map! { "Name" => "A", "Email" => "a@x.org" })?;
                pool.create(field_map! { "Name" => "B", "Email" => "a@x.org" })
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::UniqueViolation { .. }));

        let err = engine
            .execute(ADMIN, |env| env.pool("Partner")?.create(field_map! { "Name" => "A", "Age" => "old" }))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidValue { .. }));

        let err = engine
            .execute(ADMIN, |env| env.pool("Partner")?.create(field_map! { "Nope" => 1 }))
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownField { .. }));
    }

    #[test]
    fn unlink_applies_on_delete_policies() {
        engine()
            .execute(ADMIN, |env| {
                let parent = partner(env, "Parent", 50);
                let child = partner(env, "Child", 5);
                child.set("Parent", parent.ids()[0])?;
                let invoice = env
                    .pool("Invoice")?
                    .create(field_map! { "Partner" => child.ids()[0] })?;

                assert!(matches!(child.unlink(), Err(CoreError::RestrictViolation { .. })));
                assert_eq!(parent.unlink()?, 1);
                assert_eq!(child.get("Parent")?, Value::Null);
                assert_eq!(parent.fetch()?.len(), 0);

                invoice.unlink()?;
                assert_eq!(child.unlink()?, 1);
                assert_eq!(child.unlink()?, 0);
                assert!(matches!(child.get("Name"), Err(CoreError::MissingRecord { .. })));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn base_methods() {
        engine()
            .execute(ADMIN, |env| {
                let pool = env.pool("Partner")?;
                assert_eq!(pool.default_get()?.get("Age"), Some(&Value::Integer(18)));

                let ann = pool.create(field_map! { "Name" => "Ann", "Email" => "ann@x.org" })?;
                assert_eq!(ann.get("Age")?, Value::Integer(18));
                assert_eq!(ann.name_get()?, "Ann");

                let copy = ann.copy(field_map! { "name" => "Ann (copy)" })?;
                assert_ne!(copy, ann);
                assert_eq!(copy.get("Email")?, Value::Text(String::new()));
                assert_eq!(copy.get("Age")?, Value::Integer(18));

                let found = pool.name_search(NameSearchParams::new("ann"))?;
                assert_eq!(found.len(), 2);
                let exact = pool.name_search(NameSearchParams::new("Ann").operator(Operator::Equals))?;
                assert_eq!(exact, ann);
                assert_eq!(pool.name_search(NameSearchParams::default().limit(1))?.len(), 1);

                let invoice = env.pool("Invoice")?.create(FieldMap::new())?;
                assert_eq!(invoice.name_get()?, format!("Invoice,{}", invoice.ids()[0]));

                let rows = ann.read(&["Name", "Age"])?;
                assert_eq!(rows[0].get("Name"), Some(&Value::Text("Ann".into())));
                assert_eq!(rows[0].len(), 2);
                Ok(())
            })
            .unwrap();
    }
}
