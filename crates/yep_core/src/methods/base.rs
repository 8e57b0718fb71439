//! Methods every model is declared with.

use crate::condition::{Condition, Operator};
use crate::error::CoreResult;
use crate::methods::Super;
use crate::models::{FieldType, Model};
use crate::recordset::{create_records, default_values, unlink_records, write_records, RecordSet};
use std::sync::Arc;
use yep_value::{FieldMap, Value};

/// Arguments of the `NameSearch` method.
#[derive(Debug, Clone)]
pub struct NameSearchParams {
    /// Extra condition the records must match.
    pub args: Condition,
    /// Text searched in the display name. Empty matches every record.
    pub name: String,
    /// Comparison of the display name with `name`.
    pub operator: Operator,
    /// Maximum number of records, the configured default when `None`.
    pub limit: Option<usize>,
}

impl NameSearchParams {
    /// Searches `name` with the default operator.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the extra condition.
    #[must_use]
    pub fn args(mut self, args: Condition) -> Self {
        self.args = args;
        self
    }

    /// Sets the operator.
    #[must_use]
    pub const fn operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    /// Sets the limit.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn pattern(&self) -> String {
        match self.operator {
            Operator::Like | Operator::ILike | Operator::NotLike | Operator::NotILike => {
                format!("%{}%", self.name)
            }
            _ => self.name.clone(),
        }
    }
}

impl Default for NameSearchParams {
    fn default() -> Self {
        Self {
            args: Condition::True,
            name: String::new(),
            operator: Operator::ILike,
            limit: None,
        }
    }
}

/// Declares the base methods on a new model.
pub(crate) fn declare(model: &Arc<Model>) -> CoreResult<()> {
    model.create_method("Create", |rs: &RecordSet, _: &Super<FieldMap, RecordSet>, values| {
        create_records(rs, values)
    })?;
    model.create_method("Write", |rs: &RecordSet, _: &Super<FieldMap, ()>, values| {
        write_records(rs, values)
    })?;
    model.create_method("Unlink", |rs: &RecordSet, _: &Super<(), usize>, ()| {
        unlink_records(rs)
    })?;
    model.create_method("Copy", |rs: &RecordSet, _: &Super<FieldMap, RecordSet>, overrides| {
        copy(rs, overrides)
    })?;
    model.create_method("NameGet", |rs: &RecordSet, _: &Super<(), String>, ()| name_get(rs))?;
    model.create_method(
        "NameSearch",
        |rs: &RecordSet, _: &Super<NameSearchParams, RecordSet>, params| name_search(rs, params),
    )?;
    model.create_method("DefaultGet", |rs: &RecordSet, _: &Super<(), FieldMap>, ()| {
        Ok(default_values(rs.env(), rs.model()))
    })?;
    Ok(())
}

fn copy(rs: &RecordSet, overrides: FieldMap) -> CoreResult<RecordSet> {
    rs.ensure_one()?;
    let mut values = FieldMap::new();
    for field in rs.model().fields().all() {
        if field.is_no_copy() || field.is_computed() || field.is_related() {
            continue;
        }
        if field.is_column() || field.field_type() == FieldType::Many2Many {
            values.insert(field.name(), rs.get(field.name())?);
        }
    }
    for (name, value) in overrides {
        let field = rs.model().field(&name)?;
        values.insert(field.name(), value);
    }
    let copy: RecordSet = rs.call("Create", values)?;
    Ok(copy.with_env(rs.env().pop_frame()))
}

fn name_get(rs: &RecordSet) -> CoreResult<String> {
    let id = rs.ensure_one()?;
    match rs.model().rec_name() {
        Some(field) => Ok(match rs.get(field.name())? {
            Value::Text(name) => name,
            other => other.to_string(),
        }),
        None => Ok(format!("{},{id}", rs.model_name())),
    }
}

fn name_search(rs: &RecordSet, params: NameSearchParams) -> CoreResult<RecordSet> {
    let mut cond = params.args.clone();
    if !params.name.is_empty() {
        if let Some(field) = rs.model().rec_name() {
            cond = cond.and(Condition::new(field.name(), params.operator, params.pattern()));
        }
    }
    let limit = params.limit.unwrap_or(rs.env().config().name_search_limit);
    let found = rs.search(cond)?.limit(limit);
    Ok(found.with_env(rs.env().pop_frame()))
}
