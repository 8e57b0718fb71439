//! Value conversion errors.

use thiserror::Error;

/// Result type for value conversions.
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors raised when a [`crate::Value`] cannot be read as the requested type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The value holds a different variant than requested.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Requested type.
        expected: &'static str,
        /// Variant actually held.
        found: &'static str,
    },
}

impl ValueError {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }
}
