//! Store trait definition.

use crate::error::StoreResult;
use crate::stats::StatsSnapshot;
use crate::transaction::TransactionId;
use yep_value::{FieldMap, RecordId};

/// The row-level persistence interface driven by the object layer.
///
/// Stores are **schema-agnostic row stores**: a table is a set of records,
/// each a [`FieldMap`] of column values keyed by its [`RecordId`]. The
/// object layer decides which fields are columns, resolves relations and
/// evaluates search conditions.
///
/// # Invariants
///
/// - Every operation runs inside a transaction obtained from [`Store::begin`]
/// - Writes are visible to their own transaction immediately and to other
///   transactions only after [`Store::commit`]
/// - [`Store::rollback`] discards every write of the transaction
/// - `insert` assigns a fresh, never reused, strictly positive id
/// - Stores must be `Send + Sync` for concurrent access
pub trait Store: Send + Sync {
    /// Begins a new transaction.
    fn begin(&self) -> StoreResult<TransactionId>;

    /// Commits a transaction, making its writes visible.
    fn commit(&self, tx: TransactionId) -> StoreResult<()>;

    /// Rolls a transaction back, discarding its writes.
    fn rollback(&self, tx: TransactionId) -> StoreResult<()>;

    /// Inserts a row and returns its new id.
    fn insert(&self, tx: TransactionId, table: &str, values: FieldMap) -> StoreResult<RecordId>;

    /// Merges `values` into an existing row.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if the row does not exist.
    fn update(
        &self,
        tx: TransactionId,
        table: &str,
        id: RecordId,
        values: &FieldMap,
    ) -> StoreResult<()>;

    /// Deletes a row. Deleting a missing row is not an error.
    fn delete(&self, tx: TransactionId, table: &str, id: RecordId) -> StoreResult<()>;

    /// Reads a row as seen by the transaction.
    fn get(&self, tx: TransactionId, table: &str, id: RecordId) -> StoreResult<Option<FieldMap>>;

    /// Lists the ids of all rows of a table as seen by the transaction, ascending.
    fn ids(&self, tx: TransactionId, table: &str) -> StoreResult<Vec<RecordId>>;

    /// Returns a snapshot of the store's operation counters.
    fn stats(&self) -> StatsSnapshot;
}
