//! Recomputation of stored computed and related fields.

use crate::condition::Condition;
use crate::env::Environment;
use crate::error::{CoreError, CoreResult};
use crate::models::{ComputeData, ComputeSource, Field, FieldType, Model};
use crate::recordset::access::{column_value, compute_values, exists, m2m_rows, related_value};
use crate::recordset::eval::search_unrestricted;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};
use yep_value::{FieldMap, RecordId};

/// Dependent fields to recompute, with the records to recompute them on.
pub(crate) type Pending = Vec<(ComputeData, Vec<RecordId>)>;

/// Collects the fields depending on `fields` of the given records.
///
/// With `expand_inverse`, a changed foreign key or many-to-many field also
/// triggers the dependents of the inverse relation fields on the records
/// it currently points to. Call it before and after a write to catch both
/// the old and the new targets.
pub(crate) fn dependents(
    env: &Environment,
    model: &Arc<Model>,
    ids: &[RecordId],
    fields: &[String],
    expand_inverse: bool,
) -> CoreResult<Pending> {
    let mut pending = Pending::new();
    if ids.is_empty() {
        return Ok(pending);
    }
    for name in fields {
        let field = model.field(name)?;
        for dep in field.dependencies() {
            let records = if dep.path.is_empty() {
                ids.to_vec()
            } else {
                let dependent = env.registry().must_get(&dep.model)?;
                let cond = Condition::in_ids(dep.path.clone(), ids.iter().copied());
                search_unrestricted(env, &dependent, &cond)?
            };
            merge(&mut pending, vec![(dep.clone(), records)]);
        }
        if expand_inverse {
            let inverse = inverse_dependents(env, model, ids, &field)?;
            merge(&mut pending, inverse);
        }
    }
    Ok(pending)
}

fn inverse_dependents(
    env: &Environment,
    model: &Arc<Model>,
    ids: &[RecordId],
    field: &Field,
) -> CoreResult<Pending> {
    let Some(target_name) = field.relation_model() else {
        return Ok(Pending::new());
    };
    let target = env.registry().must_get(target_name)?;
    let mut targets = Vec::new();
    let mut inverse = Vec::new();
    match field.field_type() {
        FieldType::Many2One | FieldType::One2One => {
            for id in ids {
                if exists(env, model, *id)? {
                    targets.extend(column_value(env, model, *id, field)?.as_id());
                }
            }
            for candidate in target.fields().all() {
                let reverse = matches!(
                    candidate.field_type(),
                    FieldType::One2Many | FieldType::Rev2One
                );
                if reverse
                    && candidate.relation_model() == Some(model.name())
                    && candidate.reverse_fk_name() == Some(field.name())
                {
                    inverse.push(candidate.name().to_string());
                }
            }
        }
        FieldType::Many2Many => {
            let Some(link) = field.m2m() else {
                return Ok(Pending::new());
            };
            for id in ids {
                targets.extend(m2m_rows(env, field, *id)?.into_iter().map(|(_, t)| t));
            }
            for candidate in target.fields().all() {
                let same_field = target.name() == model.name() && candidate.name() == field.name();
                if !same_field && candidate.m2m().is_some_and(|l| l.model == link.model) {
                    inverse.push(candidate.name().to_string());
                }
            }
        }
        _ => {}
    }
    if targets.is_empty() || inverse.is_empty() {
        return Ok(Pending::new());
    }
    targets.sort();
    targets.dedup();
    dependents(env, &target, &targets, &inverse, false)
}

/// Merges pending recomputations, grouping records by dependent field.
pub(crate) fn merge(into: &mut Pending, more: Pending) {
    for (dep, ids) in more {
        if ids.is_empty() {
            continue;
        }
        match into.iter_mut().find(|(d, _)| *d == dep) {
            Some((_, existing)) => {
                for id in ids {
                    if !existing.contains(&id) {
                        existing.push(id);
                    }
                }
            }
            None => into.push((dep, ids)),
        }
    }
}

/// Recomputes pending fields with security bypassed.
///
/// Deleted records are skipped. A record already being recomputed for a
/// field is skipped too, which stops self-referential chains.
pub(crate) fn recompute(env: &Environment, pending: Pending) -> CoreResult<()> {
    if pending.is_empty() {
        return Ok(());
    }
    let env = env.sudo();
    let depth = env.scope().enter();
    let result = recompute_all(&env, pending, depth);
    env.scope().leave();
    result
}

fn recompute_all(env: &Environment, pending: Pending, depth: usize) -> CoreResult<()> {
    let registry = env.registry();
    for (dep, ids) in pending {
        if depth > env.config().max_recompute_depth {
            return Err(CoreError::RecomputeDepthExceeded {
                model: dep.model,
                field: dep.field,
                depth,
            });
        }
        let model = registry.must_get(&dep.model)?;
        let field = model.field(&dep.field)?;
        trace!(model = %dep.model, field = %dep.field, records = ids.len(), depth, "recompute");
        for id in ids {
            if !exists(env, &model, id)? {
                continue;
            }
            if !env.scope().begin_recompute(model.name(), field.name(), id) {
                continue;
            }
            let result = recompute_one(env, &model, &field, &dep.source, id);
            env.scope().end_recompute(model.name(), field.name(), id);
            result?;
        }
    }
    Ok(())
}

/// Computes a stored field of one record and persists the result.
fn recompute_one(
    env: &Environment,
    model: &Arc<Model>,
    field: &Field,
    source: &ComputeSource,
    id: RecordId,
) -> CoreResult<()> {
    let values = match source {
        ComputeSource::Method(method) => {
            let (computed, unset) = compute_values(env, model, id, method)?;
            let mut values = FieldMap::new();
            for (name, value) in computed {
                let target = model.field(&name)?;
                values.insert(target.name(), value);
            }
            for name in unset {
                let target = model.field(&name)?;
                values.insert(target.name(), target.zero_value());
            }
            if !values.contains(field.name()) {
                values.insert(field.name(), field.zero_value());
            }
            values.retain(|name, _| {
                model
                    .fields()
                    .get(name)
                    .is_some_and(|f| f.is_column() && f.compute_method() == Some(method.as_str()))
            });
            values
        }
        ComputeSource::Related(path) => {
            FieldMap::new().with(field.name(), related_value(env, model, id, path)?)
        }
    };
    persist_changes(env, model, id, values)
}

/// Writes the values that differ from the stored ones and recomputes what
/// depends on them. Nothing is written when every value is unchanged.
pub(crate) fn persist_changes(
    env: &Environment,
    model: &Arc<Model>,
    id: RecordId,
    values: FieldMap,
) -> CoreResult<()> {
    let mut changed = FieldMap::new();
    for (name, value) in values {
        let field = model.field(&name)?;
        if !column_value(env, model, id, &field)?.loose_eq(&value) {
            changed.insert(name, value);
        }
    }
    if changed.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = changed.keys().map(str::to_string).collect();
    let mut pending = dependents(env, model, &[id], &names, true)?;
    env.store().update(env.tx(), model.table_name(), id, &changed)?;
    env.cache().update(model.name(), id, &changed);
    debug!(model = %model.name(), %id, fields = ?names, "stored computed values");
    merge(&mut pending, dependents(env, model, &[id], &names, true)?);
    recompute(env, pending)
}

/// Computes every stored computed and related field of a new record.
pub(crate) fn compute_stored(env: &Environment, model: &Arc<Model>, id: RecordId) -> CoreResult<()> {
    let env = env.sudo();
    let mut methods_done = HashSet::new();
    for field in model.fields().all() {
        if !field.is_column() {
            continue;
        }
        let source = match (field.compute_method(), field.related_path()) {
            (Some(method), _) => {
                if !methods_done.insert(method.to_string()) {
                    continue;
                }
                ComputeSource::Method(method.to_string())
            }
            (None, Some(path)) => ComputeSource::Related(path.to_string()),
            (None, None) => continue,
        };
        recompute_one(&env, model, &field, &source, id)?;
    }
    Ok(())
}
