//! Search conditions.
//!
//! A [`Condition`] is a tree of predicates over dotted field paths
//! (`"Partner.Country.Name"`). Evaluation against records lives in the
//! record set module; this module only builds trees and compares values.

use crate::env::Environment;
use crate::error::{CoreError, CoreResult};
use regex::RegexBuilder;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use yep_value::{RecordId, Value};

/// Comparison operator of a condition leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Equals,
    /// `!=`
    NotEquals,
    /// `<`
    Lower,
    /// `<=`
    LowerOrEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// SQL `LIKE`, `%` and `_` wildcards.
    Like,
    /// SQL `NOT LIKE`.
    NotLike,
    /// Case-insensitive `LIKE`.
    ILike,
    /// Case-insensitive `NOT LIKE`.
    NotILike,
    /// Membership in a list of values.
    In,
    /// Non-membership in a list of values.
    NotIn,
}

impl Operator {
    /// Returns true for operators that negate another one.
    ///
    /// On a path reaching several values a negative operator holds when
    /// no value satisfies its positive counterpart.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        matches!(
            self,
            Self::NotEquals | Self::NotLike | Self::NotILike | Self::NotIn
        )
    }

    /// The positive counterpart of a negative operator.
    #[must_use]
    pub const fn positive(self) -> Self {
        match self {
            Self::NotEquals => Self::Equals,
            Self::NotLike => Self::Like,
            Self::NotILike => Self::ILike,
            Self::NotIn => Self::In,
            other => other,
        }
    }

    /// Compares one actual value with the expected operand.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` if a like pattern cannot be compiled.
    pub fn matches(self, actual: &Value, expected: &Value) -> CoreResult<bool> {
        if self.is_negative() {
            return self.positive().matches(actual, expected).map(|m| !m);
        }
        let ordered = |accept: fn(Ordering) -> bool| {
            !actual.is_null() && actual.compare(expected).is_some_and(accept)
        };
        Ok(match self {
            Self::Equals => actual.loose_eq(expected),
            Self::Lower => ordered(Ordering::is_lt),
            Self::LowerOrEqual => ordered(Ordering::is_le),
            Self::Greater => ordered(Ordering::is_gt),
            Self::GreaterOrEqual => ordered(Ordering::is_ge),
            Self::Like => like(actual, expected, false)?,
            Self::ILike => like(actual, expected, true)?,
            Self::In => members(expected).iter().any(|e| actual.loose_eq(e)),
            Self::NotEquals | Self::NotLike | Self::NotILike | Self::NotIn => false,
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::Lower => "<",
            Self::LowerOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Like => "like",
            Self::NotLike => "not like",
            Self::ILike => "ilike",
            Self::NotILike => "not ilike",
            Self::In => "in",
            Self::NotIn => "not in",
        };
        f.write_str(op)
    }
}

fn members(expected: &Value) -> Vec<Value> {
    match expected {
        Value::Ids(ids) => ids.iter().copied().map(Value::Id).collect(),
        other => vec![other.clone()],
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Converts a SQL like pattern into an anchored regular expression.
pub(crate) fn like_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

fn like(actual: &Value, pattern: &Value, case_insensitive: bool) -> CoreResult<bool> {
    let pattern = text_of(pattern);
    let re = RegexBuilder::new(&like_to_regex(&pattern))
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| CoreError::invalid_value("condition", pattern.clone(), e.to_string()))?;
    Ok(re.is_match(&text_of(actual)))
}

/// Value provider evaluated against the environment at search time.
pub type DynamicValue = Arc<dyn Fn(&Environment) -> Value + Send + Sync>;

/// Right-hand side of a condition leaf.
#[derive(Clone)]
pub enum Operand {
    /// A fixed value.
    Value(Value),
    /// A value computed from the searching environment.
    Dynamic(DynamicValue),
}

impl Operand {
    /// The id of the user performing the search.
    #[must_use]
    pub fn current_user() -> Self {
        Self::Dynamic(Arc::new(|env: &Environment| {
            Value::Id(RecordId::new(env.uid().as_i64()))
        }))
    }

    pub(crate) fn resolve(&self, env: &Environment) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Dynamic(f) => f(env),
        }
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Dynamic(_) => f.write_str("<dynamic>"),
        }
    }
}

/// A search condition.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Matches every record.
    True,
    /// Compares the values reached by a dotted path.
    Leaf {
        /// Dotted field path from the searched model.
        path: String,
        /// Comparison operator.
        op: Operator,
        /// Right-hand side.
        value: Operand,
    },
    /// Every child must match.
    And(Vec<Condition>),
    /// At least one child must match.
    Or(Vec<Condition>),
    /// The child must not match.
    Not(Box<Condition>),
}

impl Condition {
    /// Creates a leaf with a fixed value.
    pub fn new(path: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self::Leaf {
            path: path.into(),
            op,
            value: Operand::Value(value.into()),
        }
    }

    /// Creates a leaf whose value is computed when the search runs.
    pub fn with_operand(path: impl Into<String>, op: Operator, value: Operand) -> Self {
        Self::Leaf {
            path: path.into(),
            op,
            value,
        }
    }

    /// `path = value`
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(path, Operator::Equals, value)
    }

    /// `path != value`
    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(path, Operator::NotEquals, value)
    }

    /// `path in ids`
    pub fn in_ids(path: impl Into<String>, ids: impl IntoIterator<Item = RecordId>) -> Self {
        Self::new(path, Operator::In, Value::Ids(ids.into_iter().collect()))
    }

    /// Conjunction of conditions. An empty list matches everything.
    #[must_use]
    pub fn all(conditions: Vec<Condition>) -> Self {
        let mut parts: Vec<Condition> = conditions.into_iter().filter(|c| !c.is_true()).collect();
        match parts.len() {
            0 => Self::True,
            1 => parts.remove(0),
            _ => Self::And(parts),
        }
    }

    /// Disjunction of conditions. An empty list matches nothing.
    #[must_use]
    pub fn any(mut conditions: Vec<Condition>) -> Self {
        if conditions.iter().any(Self::is_true) {
            return Self::True;
        }
        match conditions.len() {
            1 => conditions.remove(0),
            _ => Self::Or(conditions),
        }
    }

    /// `self AND other`
    #[must_use]
    pub fn and(self, other: Condition) -> Self {
        Self::all(vec![self, other])
    }

    /// `self OR other`
    #[must_use]
    pub fn or(self, other: Condition) -> Self {
        Self::any(vec![self, other])
    }

    /// `NOT self`
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Returns true if the condition trivially matches everything.
    #[must_use]
    pub const fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    /// Paths referenced by the condition's leaves.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::True => {}
            Self::Leaf { path, .. } => out.push(path),
            Self::And(children) | Self::Or(children) => {
                children.iter().for_each(|c| c.collect_paths(out));
            }
            Self::Not(inner) => inner.collect_paths(out),
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::True
    }
}
