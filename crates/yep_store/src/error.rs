//! Error types for store operations.

use crate::transaction::{TransactionId, TransactionState};
use thiserror::Error;
use yep_value::RecordId;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The transaction handle is unknown to the store.
    #[error("unknown transaction {0}")]
    UnknownTransaction(TransactionId),

    /// The transaction was already committed or rolled back.
    #[error("transaction {id} is not active ({state:?})")]
    TransactionNotActive {
        /// The transaction handle.
        id: TransactionId,
        /// Its current state.
        state: TransactionState,
    },

    /// The record does not exist in the table.
    #[error("record {id} not found in table {table}")]
    RecordNotFound {
        /// Table name.
        table: String,
        /// Missing record.
        id: RecordId,
    },

    /// The backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a record not found error.
    pub fn record_not_found(table: impl Into<String>, id: RecordId) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            id,
        }
    }
}
