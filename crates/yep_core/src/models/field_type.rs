//! Field types.

use std::fmt;
use yep_value::Value;

/// Type of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Raw bytes.
    Binary,
    /// Boolean.
    Boolean,
    /// Short text.
    Char,
    /// Calendar date, stored as ISO text.
    Date,
    /// Date and time, stored as ISO text.
    DateTime,
    /// Floating point number.
    Float,
    /// HTML text.
    Html,
    /// Integer.
    Integer,
    /// Many-to-many relation through a link model.
    Many2Many,
    /// Foreign key to another model.
    Many2One,
    /// Inverse of a many-to-one.
    One2Many,
    /// Unique foreign key to another model.
    One2One,
    /// Inverse of a one-to-one.
    Rev2One,
    /// One value among a fixed list.
    Selection,
    /// Long text.
    Text,
}

impl FieldType {
    /// Returns true for any relation type.
    #[must_use]
    pub const fn is_relation(self) -> bool {
        matches!(
            self,
            Self::Many2Many | Self::Many2One | Self::One2Many | Self::One2One | Self::Rev2One
        )
    }

    /// Returns true for relations stored on the other side.
    #[must_use]
    pub const fn is_reverse_relation(self) -> bool {
        matches!(self, Self::One2Many | Self::Rev2One)
    }

    /// Returns true for relations stored as a foreign key column.
    #[must_use]
    pub const fn is_fk_relation(self) -> bool {
        matches!(self, Self::Many2One | Self::One2One)
    }

    /// Returns true for relations reaching at most one record.
    #[must_use]
    pub const fn is_2one(self) -> bool {
        matches!(self, Self::Many2One | Self::One2One | Self::Rev2One)
    }

    /// Returns true for relations reaching several records.
    #[must_use]
    pub const fn is_2many(self) -> bool {
        matches!(self, Self::One2Many | Self::Many2Many)
    }

    /// Returns true for relations without a column in the model's table.
    #[must_use]
    pub const fn is_non_stored_relation(self) -> bool {
        matches!(self, Self::One2Many | Self::Rev2One | Self::Many2Many)
    }

    /// The value of an unset field of this type.
    #[must_use]
    pub fn zero_value(self) -> Value {
        match self {
            Self::Boolean => Value::Bool(false),
            Self::Integer => Value::Integer(0),
            Self::Float => Value::Float(0.0),
            Self::Char | Self::Text | Self::Html | Self::Selection => Value::Text(String::new()),
            Self::One2Many | Self::Many2Many => Value::Ids(Vec::new()),
            Self::Binary | Self::Date | Self::DateTime | Self::Many2One | Self::One2One | Self::Rev2One => {
                Value::Null
            }
        }
    }

    /// Returns true if `value` can be stored in a field of this type.
    ///
    /// `Null` is accepted everywhere; to-one relations accept integer ids.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Integer, Value::Integer(_)) => true,
            (Self::Float, Value::Float(_) | Value::Integer(_)) => true,
            (
                Self::Char | Self::Text | Self::Html | Self::Selection | Self::Date | Self::DateTime,
                Value::Text(_),
            ) => true,
            (Self::Binary, Value::Bytes(_)) => true,
            (Self::Many2One | Self::One2One | Self::Rev2One, Value::Id(_) | Value::Integer(_)) => true,
            (Self::One2Many | Self::Many2Many, Value::Ids(_) | Value::Id(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
