//! Dynamic field value type.

use crate::error::{ValueError, ValueResult};
use crate::id::RecordId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The dynamic value of one field of one record.
///
/// Relation fields use dedicated variants: a to-one relation holds
/// [`Value::Id`] (or [`Value::Null`] when unset) and a to-many relation holds
/// [`Value::Ids`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null value (unset).
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Text string (UTF-8).
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Reference to a single record.
    Id(RecordId),
    /// References to several records, in order.
    Ids(Vec<RecordId>),
}

impl Value {
    /// Returns the variant name, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Id(_) => "id",
            Value::Ids(_) => "ids",
        }
    }

    /// Returns true for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this is the zero value of its type.
    ///
    /// `Null`, `false`, `0`, `0.0`, empty text, empty bytes and an empty
    /// id list are zero. A single record reference never is.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Integer(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Id(_) => false,
            Value::Ids(ids) => ids.is_empty(),
        }
    }

    /// Reads the value as a boolean.
    pub fn as_bool(&self) -> ValueResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Null => Ok(false),
            other => Err(ValueError::type_mismatch("bool", other.type_name())),
        }
    }

    /// Reads the value as an integer.
    pub fn as_i64(&self) -> ValueResult<i64> {
        match self {
            Value::Integer(i) => Ok(*i),
            Value::Id(id) => Ok(id.as_i64()),
            Value::Null => Ok(0),
            other => Err(ValueError::type_mismatch("integer", other.type_name())),
        }
    }

    /// Reads the value as a float. Integers are widened.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> ValueResult<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            Value::Null => Ok(0.0),
            other => Err(ValueError::type_mismatch("float", other.type_name())),
        }
    }

    /// Reads the value as a string slice.
    pub fn as_str(&self) -> ValueResult<&str> {
        match self {
            Value::Text(s) => Ok(s),
            Value::Null => Ok(""),
            other => Err(ValueError::type_mismatch("text", other.type_name())),
        }
    }

    /// Reads the value as a single record reference.
    ///
    /// Returns `None` for `Null` and for an empty id list.
    #[must_use]
    pub fn as_id(&self) -> Option<RecordId> {
        match self {
            Value::Id(id) => Some(*id),
            Value::Integer(i) if *i > 0 => Some(RecordId::new(*i)),
            Value::Ids(ids) => ids.first().copied(),
            _ => None,
        }
    }

    /// Reads the value as a list of record references.
    #[must_use]
    pub fn as_ids(&self) -> Vec<RecordId> {
        match self {
            Value::Ids(ids) => ids.clone(),
            Value::Id(id) => vec![*id],
            Value::Integer(i) if *i > 0 => vec![RecordId::new(*i)],
            _ => Vec::new(),
        }
    }

    /// Compares two values for search conditions and ordering.
    ///
    /// Integers, floats and record ids compare numerically with each other.
    /// `Null` sorts before everything. Values of unrelated types are not
    /// comparable.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Ids(a), Value::Ids(b)) => Some(a.cmp(b)),
            (a, b) => match (a.numeric_id(), b.numeric_id()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => None,
            },
        }
    }

    /// Equality used by search conditions.
    ///
    /// Unlike `==`, this treats `Id(n)` and `Integer(n)` as equal and compares
    /// integers with floats numerically. `Null` equals any zero value so that
    /// a condition on "unset" matches fields holding their type's zero value.
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, v) | (v, Value::Null) => v.is_zero(),
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }

    fn numeric_id(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Id(id) => Some(id.as_i64()),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Id(id) => write!(f, "#{id}"),
            Value::Ids(ids) => {
                write!(f, "[")?;
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "#{id}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<RecordId> for Value {
    fn from(v: RecordId) -> Self {
        Value::Id(v)
    }
}

impl From<Vec<RecordId>> for Value {
    fn from(v: Vec<RecordId>) -> Self {
        Value::Ids(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
