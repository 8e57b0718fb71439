//! Create, write and unlink.
//!
//! These functions are the bottom layers of the `Create`, `Write` and
//! `Unlink` base methods. Writes they make on behalf of the user to other
//! records (reverse relations, related fields, on-delete policies) run with
//! security bypassed.

use crate::condition::Condition;
use crate::env::Environment;
use crate::error::{CoreError, CoreResult};
use crate::models::{Field, FieldType, Model, OnDelete};
use crate::recordset::access::{exists, field_permission, m2m_rows, raw_value, reverse_ids};
use crate::recordset::compute::{compute_stored, dependents, merge, recompute};
use crate::recordset::eval::{narrow, search_unrestricted};
use crate::recordset::RecordSet;
use crate::security::Permission;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use yep_value::{FieldMap, RecordId, Value};

/// Values of a create or write call, split by how they are persisted.
#[derive(Default)]
struct Split {
    columns: FieldMap,
    relations: Vec<(Arc<Field>, Value)>,
    related: Vec<(Arc<Field>, Value)>,
}

impl Split {
    fn names(&self) -> Vec<String> {
        self.columns
            .keys()
            .map(str::to_string)
            .chain(self.relations.iter().map(|(f, _)| f.name().to_string()))
            .chain(self.related.iter().map(|(f, _)| f.name().to_string()))
            .collect()
    }
}

pub(crate) fn create_records(rs: &RecordSet, values: FieldMap) -> CoreResult<RecordSet> {
    let env = rs.env();
    let model = rs.model();
    let mut values = prepare(env, model, values)?;

    for field in model.fields().all() {
        if values.contains(field.name()) {
            continue;
        }
        if let Some(default) = field.default_fn() {
            let value = default(env, &values);
            values.insert(field.name(), value);
        }
    }
    let values = coerce(model, values)?;

    for field in model.fields().all() {
        let plain = field.is_column() && !field.is_computed() && !field.is_related();
        if plain && field.is_required() && values.get(field.name()).map_or(true, Value::is_null) {
            return Err(CoreError::required_field(model.name(), field.name()));
        }
    }

    let mut split = split(model, values)?;
    check_unique(env, model, &[], &split.columns)?;
    let names = split.names();
    for field in model.fields().all() {
        if field.is_column() && !split.columns.contains(field.name()) {
            split.columns.insert(field.name(), field.zero_value());
        }
    }

    let id = env
        .store()
        .insert(env.tx(), model.table_name(), split.columns.clone())?;
    env.cache().insert(model.name(), id, split.columns);
    for (field, value) in &split.relations {
        write_x2many(env, model, id, field, value)?;
    }
    for (field, value) in &split.related {
        write_related(env, model, id, field, value)?;
    }
    compute_stored(env, model, id)?;
    recompute(env, dependents(env, model, &[id], &names, true)?)?;
    debug!(model = %model.name(), %id, "record created");

    Ok(RecordSet::new(env.pop_frame(), Arc::clone(model), vec![id]))
}

pub(crate) fn write_records(rs: &RecordSet, values: FieldMap) -> CoreResult<()> {
    let env = rs.env();
    let model = rs.model();
    let values = coerce(model, prepare(env, model, values)?)?;
    if values.is_empty() || rs.is_empty() {
        return Ok(());
    }

    for id in rs.ids() {
        if !exists(env, model, *id)? {
            return Err(CoreError::MissingRecord {
                model: model.name().to_string(),
                id: *id,
            });
        }
    }
    let ids = narrow(env, model, rs.ids().to_vec(), Permission::WRITE)?;
    if ids.is_empty() {
        return Ok(());
    }

    let split = split(model, values)?;
    for (name, value) in &split.columns {
        let field = model.field(name)?;
        if field.is_required() && value.is_null() {
            return Err(CoreError::required_field(model.name(), name));
        }
    }
    check_unique(env, model, &ids, &split.columns)?;

    let names = split.names();
    let mut pending = dependents(env, model, &ids, &names, true)?;
    for id in &ids {
        if !split.columns.is_empty() {
            env.store()
                .update(env.tx(), model.table_name(), *id, &split.columns)?;
            env.cache().update(model.name(), *id, &split.columns);
        }
        for (field, value) in &split.relations {
            write_x2many(env, model, *id, field, value)?;
        }
        for (field, value) in &split.related {
            write_related(env, model, *id, field, value)?;
        }
    }
    debug!(model = %model.name(), records = ids.len(), fields = ?names, "records written");
    merge(&mut pending, dependents(env, model, &ids, &names, true)?);
    recompute(env, pending)
}

pub(crate) fn unlink_records(rs: &RecordSet) -> CoreResult<usize> {
    let env = rs.env();
    let model = rs.model();
    let mut ids = Vec::new();
    for id in narrow(env, model, rs.ids().to_vec(), Permission::UNLINK)? {
        if exists(env, model, id)? {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Ok(0);
    }
    let deleted: HashSet<RecordId> = ids.iter().copied().collect();

    let mut referencing = Vec::new();
    for other in env.registry().models() {
        for field in other.fields().all() {
            if field.field_type().is_fk_relation()
                && field.is_column()
                && field.relation_model() == Some(model.name())
            {
                referencing.push((Arc::clone(other), field));
            }
        }
    }
    let referrers = |other: &Arc<Model>, field: &Field| -> CoreResult<Vec<RecordId>> {
        let found = search_unrestricted(env, other, &Condition::in_ids(field.name(), ids.iter().copied()))?;
        Ok(found
            .into_iter()
            .filter(|id| other.name() != model.name() || !deleted.contains(id))
            .collect())
    };

    for (other, field) in &referencing {
        if field.on_delete_policy() == OnDelete::Restrict && !referrers(other, field)?.is_empty() {
            return Err(CoreError::RestrictViolation {
                model: model.name().to_string(),
                referencing: format!("{}.{}", other.name(), field.name()),
            });
        }
    }

    let names: Vec<String> = model
        .fields()
        .all()
        .iter()
        .filter(|f| f.is_column() || f.field_type() == FieldType::Many2Many)
        .map(|f| f.name().to_string())
        .collect();
    let pending = dependents(env, model, &ids, &names, true)?;

    for (other, field) in &referencing {
        let found = referrers(other, field)?;
        if found.is_empty() {
            continue;
        }
        let target = RecordSet::new(env.sudo(), Arc::clone(other), found);
        match field.on_delete_policy() {
            OnDelete::Cascade => {
                unlink_records(&target)?;
            }
            OnDelete::SetNull => write_records(&target, FieldMap::new().with(field.name(), Value::Null))?,
            OnDelete::Restrict => {}
        }
    }

    for id in &ids {
        env.store().delete(env.tx(), model.table_name(), *id)?;
        env.cache().invalidate(model.name(), *id);
    }
    debug!(model = %model.name(), records = ids.len(), "records deleted");
    recompute(env, pending)?;
    Ok(ids.len())
}

/// Evaluates every default provider of a model.
pub(crate) fn default_values(env: &Environment, model: &Model) -> FieldMap {
    let mut values = FieldMap::new();
    for field in model.fields().all() {
        if let Some(default) = field.default_fn() {
            let value = default(env, &values);
            values.insert(field.name(), value);
        }
    }
    values
}

/// Maps JSON names to field names and drops the fields the user may not
/// write.
fn prepare(env: &Environment, model: &Model, values: FieldMap) -> CoreResult<FieldMap> {
    let mut out = FieldMap::new();
    for (name, value) in values {
        let field = model.field(&name)?;
        if !field_permission(env, &field).contains(Permission::WRITE) {
            debug!(model = %model.name(), field = %field.name(), uid = %env.uid(), "write to field denied, skipped");
            continue;
        }
        out.insert(field.name(), value);
    }
    Ok(out)
}

/// Normalises relation values and checks every value's type.
fn coerce(model: &Model, values: FieldMap) -> CoreResult<FieldMap> {
    let mut out = FieldMap::new();
    for (name, value) in values {
        let field = model.field(&name)?;
        let field_type = field.field_type();
        let value = match value {
            Value::Integer(i) if field_type.is_2one() => {
                if i > 0 {
                    Value::Id(RecordId::new(i))
                } else {
                    Value::Null
                }
            }
            Value::Id(id) if field_type.is_2many() => Value::Ids(vec![id]),
            Value::Null if field_type.is_2many() => Value::Ids(Vec::new()),
            other => other,
        };
        if !field_type.accepts(&value) {
            return Err(CoreError::invalid_value(
                model.name(),
                field.name(),
                format!("{field_type} field cannot hold {value}"),
            ));
        }
        out.insert(name, value);
    }
    Ok(out)
}

fn split(model: &Model, values: FieldMap) -> CoreResult<Split> {
    let mut split = Split::default();
    for (name, value) in values {
        let field = model.field(&name)?;
        if field.is_related() {
            split.related.push((field, value));
        } else if field.is_computed() {
            warn!(model = %model.name(), field = %name, "value of computed field ignored");
        } else if field.is_column() {
            split.columns.insert(name, value);
        } else {
            split.relations.push((field, value));
        }
    }
    Ok(split)
}

/// Checks unique columns against the other records of the model.
fn check_unique(
    env: &Environment,
    model: &Arc<Model>,
    ids: &[RecordId],
    columns: &FieldMap,
) -> CoreResult<()> {
    for (name, value) in columns {
        let field = model.field(name)?;
        if !field.is_unique() || value.is_zero() {
            continue;
        }
        let violation = || CoreError::UniqueViolation {
            model: model.name().to_string(),
            field: name.clone(),
            value: value.to_string(),
        };
        if ids.len() > 1 {
            return Err(violation());
        }
        let taken = search_unrestricted(env, model, &Condition::eq(name.clone(), value.clone()))?;
        if taken.iter().any(|id| !ids.contains(id)) {
            return Err(violation());
        }
    }
    Ok(())
}

/// Replaces the records a to-many or reverse relation points to.
fn write_x2many(
    env: &Environment,
    model: &Model,
    id: RecordId,
    field: &Field,
    value: &Value,
) -> CoreResult<()> {
    let wanted = value.as_ids();
    match field.field_type() {
        FieldType::One2Many | FieldType::Rev2One => {
            let target = env.registry().must_get(field.relation_model().unwrap_or_default())?;
            let fk = target.field(field.reverse_fk_name().unwrap_or_default())?;
            let current = reverse_ids(env, &target, &fk, id)?;
            let removed: Vec<RecordId> = current.iter().filter(|r| !wanted.contains(r)).copied().collect();
            let added: Vec<RecordId> = wanted.iter().filter(|r| !current.contains(r)).copied().collect();
            if !removed.is_empty() {
                let rs = RecordSet::new(env.sudo(), Arc::clone(&target), removed);
                write_records(&rs, FieldMap::new().with(fk.name(), Value::Null))?;
            }
            if !added.is_empty() {
                let rs = RecordSet::new(env.sudo(), target, added);
                write_records(&rs, FieldMap::new().with(fk.name(), Value::Id(id)))?;
            }
        }
        FieldType::Many2Many => {
            let link = field.m2m().ok_or_else(|| {
                CoreError::invalid_field(model.name(), field.name(), "link model not resolved")
            })?;
            let link_model = env.registry().must_get(&link.model)?;
            let rows = m2m_rows(env, field, id)?;
            for (row, related) in &rows {
                if !wanted.contains(related) {
                    env.store().delete(env.tx(), link_model.table_name(), *row)?;
                    env.cache().invalidate(link_model.name(), *row);
                }
            }
            let present: HashSet<RecordId> = rows.iter().map(|(_, r)| *r).collect();
            let mut seen = HashSet::new();
            for related in wanted {
                if present.contains(&related) || !seen.insert(related) {
                    continue;
                }
                let row = FieldMap::new()
                    .with(link.ours.clone(), Value::Id(id))
                    .with(link.theirs.clone(), Value::Id(related));
                let row_id = env.store().insert(env.tx(), link_model.table_name(), row.clone())?;
                env.cache().insert(link_model.name(), row_id, row);
            }
        }
        other => {
            return Err(CoreError::invalid_value(
                model.name(),
                field.name(),
                format!("{other} is not a to-many relation"),
            ))
        }
    }
    Ok(())
}

/// Writes a related field's value on the record at the end of its path.
///
/// Nothing is written when the path is broken.
fn write_related(
    env: &Environment,
    model: &Arc<Model>,
    id: RecordId,
    field: &Field,
    value: &Value,
) -> CoreResult<()> {
    let path = field.related_path().unwrap_or_default();
    let tokens: Vec<&str> = path.split('.').collect();
    let Some((last, prefix)) = tokens.split_last() else {
        return Ok(());
    };
    let mut current = Arc::clone(model);
    let mut current_id = id;
    for token in prefix {
        let step = current.field(token)?;
        let Some(next) = raw_value(env, &current, current_id, &step)?.as_id() else {
            debug!(model = %model.name(), field = %field.name(), %id, "related path broken, value not written");
            return Ok(());
        };
        current = env.registry().must_get(step.relation_model().unwrap_or_default())?;
        current_id = next;
    }
    let target = RecordSet::new(env.sudo(), current, vec![current_id]);
    write_records(&target, FieldMap::new().with(*last, value.clone()))
}

