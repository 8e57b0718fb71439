//! # Yep Value
//!
//! Dynamic values exchanged between the Yep object layer and its store.
//!
//! This crate provides:
//! - [`Value`], the dynamic value of a single field
//! - [`FieldMap`], an ordered map of field name to value
//! - [`RecordId`], the identity of a record within a model

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod field_map;
mod id;
mod value;

pub use error::{ValueError, ValueResult};
pub use field_map::FieldMap;
pub use id::RecordId;
pub use value::Value;

/// Builds a [`FieldMap`] from `name => value` pairs.
///
/// ```rust
/// use yep_value::{field_map, Value};
///
/// let values = field_map! { "Name" => "Jane", "Age" => 31 };
/// assert_eq!(values.get("Age"), Some(&Value::Integer(31)));
/// ```
#[macro_export]
macro_rules! field_map {
    () => { $crate::FieldMap::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::FieldMap::new();
        $( map.insert($name, $crate::Value::from($value)); )+
        map
    }};
}
