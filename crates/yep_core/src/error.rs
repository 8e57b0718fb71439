//! Error types for the Yep object layer.

use thiserror::Error;
use yep_store::StoreError;
use yep_value::{RecordId, ValueError};

use crate::security::{Permission, UserId};

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Broad classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid model, field or method declarations. Raised during
    /// registration and bootstrap, or by misuse of the layering API.
    Configuration,
    /// A method or record is not accessible to the current user.
    AccessDenied,
    /// Record-set or value constraints were violated.
    Data,
    /// The persistence collaborator failed.
    Storage,
}

/// Errors that can occur in the Yep object layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A model with this name already exists.
    #[error("model {model} is already registered")]
    DuplicateModel {
        /// Model name.
        model: String,
    },

    /// No model with this name exists.
    #[error("unknown model {model}")]
    UnknownModel {
        /// Model name.
        model: String,
    },

    /// A field with this name already exists on the model.
    #[error("field {model}.{field} is already declared")]
    DuplicateField {
        /// Model name.
        model: String,
        /// Field name.
        field: String,
    },

    /// No field with this name or JSON name exists on the model.
    #[error("unknown field {model}.{field}")]
    UnknownField {
        /// Model name.
        model: String,
        /// Field name.
        field: String,
    },

    /// A field declaration is inconsistent.
    #[error("invalid field {model}.{field}: {reason}")]
    InvalidField {
        /// Model name.
        model: String,
        /// Field name.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A dotted path could not be resolved.
    #[error("cannot resolve path {path} on {model}: {reason}")]
    UnresolvedPath {
        /// Model the path starts from.
        model: String,
        /// The dotted path.
        path: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A method with this name already exists on the model.
    #[error("method {model}.{method} already exists")]
    DuplicateMethod {
        /// Model name.
        model: String,
        /// Method name.
        method: String,
    },

    /// No method with this name exists on the model.
    #[error("unknown method {model}.{method}")]
    UnknownMethod {
        /// Model name.
        model: String,
        /// Method name.
        method: String,
    },

    /// A layer or a call does not match the method's signature.
    #[error("signature mismatch on {model}.{method}: expected {expected}, got {found}")]
    SignatureMismatch {
        /// Model name.
        model: String,
        /// Method name.
        method: String,
        /// The method's signature.
        expected: String,
        /// The offending signature.
        found: String,
    },

    /// A compute method has an unusable signature.
    #[error("compute method {model}.{method} is invalid: {reason}")]
    InvalidComputeMethod {
        /// Model name.
        model: String,
        /// Method name.
        method: String,
        /// Why it is rejected.
        reason: String,
    },

    /// Stored computed fields depend on each other in a loop.
    #[error("dependency cycle between computed fields: {cycle}")]
    DependencyCycle {
        /// The fields of the cycle, `Model.Field` joined by arrows.
        cycle: String,
    },

    /// The bottom layer of a method called through to the layer below it.
    #[error("no layer below the current one for {model}.{method}")]
    NoSuperLayer {
        /// Model name.
        model: String,
        /// Method name.
        method: String,
    },

    /// The registry was already bootstrapped and is frozen.
    #[error("registry is already bootstrapped")]
    AlreadyBootstrapped,

    /// The registry must be bootstrapped before use.
    #[error("registry is not bootstrapped")]
    NotBootstrapped,

    /// No group with this id exists.
    #[error("unknown group {group}")]
    UnknownGroup {
        /// Group id.
        group: String,
    },

    /// Recomputation nested deeper than the configured limit.
    #[error("recomputation of {model}.{field} exceeded depth {depth}")]
    RecomputeDepthExceeded {
        /// Model name.
        model: String,
        /// Field being recomputed.
        field: String,
        /// The configured limit.
        depth: usize,
    },

    /// The user may not execute the method.
    #[error("user {uid} may not execute {model}.{method}")]
    AccessDenied {
        /// Model name.
        model: String,
        /// Method name.
        method: String,
        /// The denied user.
        uid: UserId,
    },

    /// Record rules hide the record from the user.
    #[error("record {model}#{id} is not accessible for {perm:?}")]
    RecordAccessDenied {
        /// Model name.
        model: String,
        /// The hidden record.
        id: RecordId,
        /// The requested permission.
        perm: Permission,
    },

    /// The operation needs at least one record.
    #[error("{operation} called on an empty {model} record set")]
    EmptyRecordSet {
        /// Model name.
        model: String,
        /// The operation.
        operation: String,
    },

    /// The operation needs exactly one record.
    #[error("expected a single {model} record, got {len}")]
    NotSingleton {
        /// Model name.
        model: String,
        /// Actual number of records.
        len: usize,
    },

    /// The record does not exist.
    #[error("record {model}#{id} does not exist")]
    MissingRecord {
        /// Model name.
        model: String,
        /// The missing record.
        id: RecordId,
    },

    /// A required field is missing or null.
    #[error("field {model}.{field} is required")]
    RequiredField {
        /// Model name.
        model: String,
        /// Field name.
        field: String,
    },

    /// A unique field value is already used by another record.
    #[error("value {value} of {model}.{field} is not unique")]
    UniqueViolation {
        /// Model name.
        model: String,
        /// Field name.
        field: String,
        /// The duplicated value, formatted.
        value: String,
    },

    /// Records cannot be deleted because others restrict the deletion.
    #[error("cannot delete {model} records: still referenced by {referencing}")]
    RestrictViolation {
        /// Model of the records being deleted.
        model: String,
        /// The referencing `Model.Field`.
        referencing: String,
    },

    /// Two record sets of different models were combined.
    #[error("cannot combine {left} and {right} record sets")]
    ModelMismatch {
        /// Left-hand model.
        left: String,
        /// Right-hand model.
        right: String,
    },

    /// A value cannot be stored in a field.
    #[error("invalid value for {model}.{field}: {reason}")]
    InvalidValue {
        /// Model name.
        model: String,
        /// Field name.
        field: String,
        /// Why it is rejected.
        reason: String,
    },

    /// Value conversion error.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateModel { .. }
            | Self::UnknownModel { .. }
            | Self::DuplicateField { .. }
            | Self::UnknownField { .. }
            | Self::InvalidField { .. }
            | Self::UnresolvedPath { .. }
            | Self::DuplicateMethod { .. }
            | Self::UnknownMethod { .. }
            | Self::SignatureMismatch { .. }
            | Self::InvalidComputeMethod { .. }
            | Self::DependencyCycle { .. }
            | Self::NoSuperLayer { .. }
            | Self::AlreadyBootstrapped
            | Self::NotBootstrapped
            | Self::UnknownGroup { .. }
            | Self::RecomputeDepthExceeded { .. } => ErrorKind::Configuration,
            Self::AccessDenied { .. } | Self::RecordAccessDenied { .. } => {
                ErrorKind::AccessDenied
            }
            Self::EmptyRecordSet { .. }
            | Self::NotSingleton { .. }
            | Self::MissingRecord { .. }
            | Self::RequiredField { .. }
            | Self::UniqueViolation { .. }
            | Self::RestrictViolation { .. }
            | Self::ModelMismatch { .. }
            | Self::InvalidValue { .. }
            | Self::Value(_) => ErrorKind::Data,
            Self::Store(_) => ErrorKind::Storage,
        }
    }

    /// Creates an unknown model error.
    pub fn unknown_model(model: impl Into<String>) -> Self {
        Self::UnknownModel {
            model: model.into(),
        }
    }

    /// Creates an unknown field error.
    pub fn unknown_field(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            model: model.into(),
            field: field.into(),
        }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(
        model: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            model: model.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unresolved path error.
    pub fn unresolved_path(
        model: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnresolvedPath {
            model: model.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unknown method error.
    pub fn unknown_method(model: impl Into<String>, method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            model: model.into(),
            method: method.into(),
        }
    }

    /// Creates an invalid compute method error.
    pub fn invalid_compute_method(
        model: impl Into<String>,
        method: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidComputeMethod {
            model: model.into(),
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Creates an access denied error for a method call.
    pub fn access_denied(model: impl Into<String>, method: impl Into<String>, uid: UserId) -> Self {
        Self::AccessDenied {
            model: model.into(),
            method: method.into(),
            uid,
        }
    }

    /// Creates an empty record set error.
    pub fn empty_record_set(model: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::EmptyRecordSet {
            model: model.into(),
            operation: operation.into(),
        }
    }

    /// Creates a required field error.
    pub fn required_field(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self::RequiredField {
            model: model.into(),
            field: field.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(
        model: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            model: model.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error denies access.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        self.kind() == ErrorKind::AccessDenied
    }
}
