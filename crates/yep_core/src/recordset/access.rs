//! Raw field access, below field access control.

use crate::env::Environment;
use crate::error::{CoreError, CoreResult};
use crate::models::{Field, FieldType, Model};
use crate::recordset::RecordSet;
use crate::security::Permission;
use std::sync::Arc;
use yep_value::{FieldMap, RecordId, Value};

/// Loads a row into the cache. Returns false if the record does not exist.
pub(crate) fn exists(env: &Environment, model: &Model, id: RecordId) -> CoreResult<bool> {
    if env.cache().contains(model.name(), id) {
        return Ok(true);
    }
    match env.store().get(env.tx(), model.table_name(), id)? {
        Some(row) => {
            env.cache().insert(model.name(), id, row);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Ids of every record of the model, ascending.
pub(crate) fn all_ids(env: &Environment, model: &Model) -> CoreResult<Vec<RecordId>> {
    Ok(env.store().ids(env.tx(), model.table_name())?)
}

/// Value of a column, from the cache or the store.
pub(crate) fn column_value(
    env: &Environment,
    model: &Model,
    id: RecordId,
    field: &Field,
) -> CoreResult<Value> {
    if let Some(value) = env.cache().get(model.name(), id, field.name()) {
        return Ok(value);
    }
    if !exists(env, model, id)? {
        return Err(CoreError::MissingRecord {
            model: model.name().to_string(),
            id,
        });
    }
    Ok(env
        .cache()
        .get(model.name(), id, field.name())
        .unwrap_or_else(|| field.zero_value()))
}

/// Value of any field, without access control.
///
/// Reverse and many-to-many relations are resolved through the related
/// tables. Computed and related fields that are not stored are evaluated
/// on every call.
pub(crate) fn raw_value(
    env: &Environment,
    model: &Arc<Model>,
    id: RecordId,
    field: &Field,
) -> CoreResult<Value> {
    if field.is_column() {
        return column_value(env, model, id, field);
    }
    if let Some(path) = field.related_path() {
        return related_value(env, model, id, path);
    }
    if let Some(method) = field.compute_method() {
        let (values, _) = compute_values(env, model, id, method)?;
        return Ok(values
            .get(field.name())
            .cloned()
            .unwrap_or_else(|| field.zero_value()));
    }
    match field.field_type() {
        FieldType::One2Many | FieldType::Rev2One => {
            let target = env.registry().must_get(field.relation_model().unwrap_or_default())?;
            let fk = target.field(field.reverse_fk_name().unwrap_or_default())?;
            let ids = reverse_ids(env, &target, &fk, id)?;
            Ok(if field.field_type() == FieldType::Rev2One {
                ids.first().map_or(Value::Null, |id| Value::Id(*id))
            } else {
                Value::Ids(ids)
            })
        }
        FieldType::Many2Many => Ok(Value::Ids(
            m2m_rows(env, field, id)?.into_iter().map(|(_, t)| t).collect(),
        )),
        _ => column_value(env, model, id, field),
    }
}

/// Records of `target` whose foreign key `fk` points to `id`.
pub(crate) fn reverse_ids(
    env: &Environment,
    target: &Model,
    fk: &Field,
    id: RecordId,
) -> CoreResult<Vec<RecordId>> {
    let mut out = Vec::new();
    for candidate in all_ids(env, target)? {
        if column_value(env, target, candidate, fk)?.as_id() == Some(id) {
            out.push(candidate);
        }
    }
    Ok(out)
}

/// Link rows of a many-to-many field for one record, as
/// `(link id, related id)`.
pub(crate) fn m2m_rows(
    env: &Environment,
    field: &Field,
    id: RecordId,
) -> CoreResult<Vec<(RecordId, RecordId)>> {
    let link = field
        .m2m()
        .ok_or_else(|| CoreError::invalid_field(field.model_name(), field.name(), "link model not resolved"))?;
    let link_model = env.registry().must_get(&link.model)?;
    let ours = link_model.field(&link.ours)?;
    let theirs = link_model.field(&link.theirs)?;
    let mut out = Vec::new();
    for row in all_ids(env, &link_model)? {
        if column_value(env, &link_model, row, &ours)?.as_id() == Some(id) {
            if let Some(target) = column_value(env, &link_model, row, &theirs)?.as_id() {
                out.push((row, target));
            }
        }
    }
    Ok(out)
}

/// Follows a dotted path from a record and returns the value at its end.
///
/// Intermediate steps take the first record reached.
pub(crate) fn related_value(
    env: &Environment,
    model: &Arc<Model>,
    id: RecordId,
    path: &str,
) -> CoreResult<Value> {
    let tokens: Vec<&str> = path.split('.').collect();
    let mut current = Arc::clone(model);
    let mut current_id = id;
    for (i, token) in tokens.iter().enumerate() {
        let field = current.field(token)?;
        let value = raw_value(env, &current, current_id, &field)?;
        if i + 1 == tokens.len() {
            return Ok(value);
        }
        let Some(next) = value.as_id() else {
            let (_, last) = env.registry().resolve_path(current.name(), &tokens[i..].join("."))?;
            return Ok(last.zero_value());
        };
        current = env.registry().must_get(field.relation_model().unwrap_or_default())?;
        current_id = next;
    }
    Ok(Value::Null)
}

/// Runs a compute method on one record with security bypassed.
///
/// Returns the computed values and the fields to clear.
pub(crate) fn compute_values(
    env: &Environment,
    model: &Arc<Model>,
    id: RecordId,
    method: &str,
) -> CoreResult<(FieldMap, Vec<String>)> {
    let rs = RecordSet::new(env.sudo(), Arc::clone(model), vec![id]);
    let signature = model.method(method)?.signature();
    if signature.is::<(), FieldMap>() {
        Ok((rs.call::<(), FieldMap>(method, ())?, Vec::new()))
    } else {
        rs.call::<(), (FieldMap, Vec<String>)>(method, ())
    }
}

/// Field permission of the environment's user.
pub(crate) fn field_permission(env: &Environment, field: &Field) -> Permission {
    if env.is_sudo() {
        return Permission::ALL;
    }
    let config = env.config();
    field
        .acl()
        .permission(&env.user_groups(), &config.admin_group, &config.everyone_group)
}
