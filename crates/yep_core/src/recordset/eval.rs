//! Condition evaluation and record rule filtering.

use crate::condition::{Condition, Operand, Operator};
use crate::env::Environment;
use crate::error::CoreResult;
use crate::models::Model;
use crate::recordset::access::{all_ids, raw_value};
use crate::security::{Permission, RuleFilter};
use std::sync::Arc;
use yep_value::{RecordId, Value};

/// Ids of the records matching `cond` that read rules let the user see.
pub(crate) fn search_ids(
    env: &Environment,
    model: &Arc<Model>,
    cond: &Condition,
) -> CoreResult<Vec<RecordId>> {
    let rule = match rule_filter(env, model, Permission::READ) {
        RuleFilter::Denied => return Ok(Vec::new()),
        RuleFilter::Unrestricted => Condition::True,
        RuleFilter::Restricted(c) => c,
    };
    let mut out = Vec::new();
    for id in all_ids(env, model)? {
        if matches(env, model, id, cond)? && matches(env, model, id, &rule)? {
            out.push(id);
        }
    }
    Ok(out)
}

/// Ids of the records matching `cond`, ignoring every security rule.
pub(crate) fn search_unrestricted(
    env: &Environment,
    model: &Arc<Model>,
    cond: &Condition,
) -> CoreResult<Vec<RecordId>> {
    search_ids(&env.sudo(), model, cond)
}

/// Keeps the records the rules for `perm` let the user access.
pub(crate) fn narrow(
    env: &Environment,
    model: &Arc<Model>,
    ids: Vec<RecordId>,
    perm: Permission,
) -> CoreResult<Vec<RecordId>> {
    match rule_filter(env, model, perm) {
        RuleFilter::Unrestricted => Ok(ids),
        RuleFilter::Denied => Ok(Vec::new()),
        RuleFilter::Restricted(cond) => {
            let mut out = Vec::with_capacity(ids.len());
            for id in ids {
                if matches(env, model, id, &cond)? {
                    out.push(id);
                }
            }
            Ok(out)
        }
    }
}

fn rule_filter(env: &Environment, model: &Model, perm: Permission) -> RuleFilter {
    if env.is_sudo() {
        return RuleFilter::Unrestricted;
    }
    env.registry()
        .security()
        .rules()
        .filter(model.name(), perm, &env.user_groups())
}

/// Evaluates a condition on one record.
pub(crate) fn matches(
    env: &Environment,
    model: &Arc<Model>,
    id: RecordId,
    cond: &Condition,
) -> CoreResult<bool> {
    match cond {
        Condition::True => Ok(true),
        Condition::Leaf { path, op, value } => leaf(env, model, id, path, *op, value),
        Condition::And(children) => {
            for child in children {
                if !matches(env, model, id, child)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Or(children) => {
            for child in children {
                if matches(env, model, id, child)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::Not(inner) => Ok(!matches(env, model, id, inner)?),
    }
}

fn leaf(
    env: &Environment,
    model: &Arc<Model>,
    id: RecordId,
    path: &str,
    op: Operator,
    operand: &Operand,
) -> CoreResult<bool> {
    let expected = operand.resolve(env);
    let positive = op.positive();
    let mut hit = false;
    for value in path_values(env, model, id, path)? {
        if positive.matches(&value, &expected)? {
            hit = true;
            break;
        }
    }
    Ok(hit != op.is_negative())
}

/// Values reached by a dotted path from one record.
///
/// To-many steps fan out, so a leaf matches when any reached value does.
/// A path reaching nothing yields a single `Null`.
fn path_values(
    env: &Environment,
    model: &Arc<Model>,
    id: RecordId,
    path: &str,
) -> CoreResult<Vec<Value>> {
    let tokens: Vec<&str> = path.split('.').collect();
    let mut current = Arc::clone(model);
    let mut ids = vec![id];
    let mut values = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        let last = i + 1 == tokens.len();
        if last && token.eq_ignore_ascii_case("id") {
            values = ids.iter().map(|id| Value::Id(*id)).collect();
            break;
        }
        let field = current.field(token)?;
        let mut reached = Vec::new();
        for id in &ids {
            reached.push(raw_value(env, &current, *id, &field)?);
        }
        if last {
            values = reached;
            break;
        }
        ids = reached.iter().flat_map(Value::as_ids).collect();
        ids.sort();
        ids.dedup();
        current = env
            .registry()
            .must_get(field.relation_model().unwrap_or_default())?;
    }

    let mut out = Vec::new();
    for value in values {
        match value {
            Value::Ids(ids) => out.extend(ids.into_iter().map(Value::Id)),
            other => out.push(other),
        }
    }
    if out.is_empty() {
        out.push(Value::Null);
    }
    Ok(out)
}
