//! Models, fields and the registry.

mod bootstrap;
mod field;
mod field_type;
mod fields;
mod model;
mod registry;

pub use field::{ComputeData, ComputeSource, DefaultFn, Field, M2MLink, OnDelete};
pub use field_type::FieldType;
pub use fields::FieldsCollection;
pub use model::{Model, ModelOptions};
pub use registry::Registry;
