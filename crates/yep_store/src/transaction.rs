//! Transaction state.

use crate::error::{StoreError, StoreResult};
use std::collections::HashMap;
use std::fmt;
use yep_value::{FieldMap, RecordId};

/// Opaque handle of a store transaction.
///
/// Transaction IDs are monotonically increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// A pending write in a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    /// Full row after the write.
    Put {
        /// Row values.
        values: FieldMap,
    },
    /// Row deletion.
    Delete,
}

/// An active transaction of the in-memory store.
///
/// Writes are buffered per `(table, id)` until commit. Reads inside the
/// transaction consult the buffer before the committed tables.
#[derive(Debug)]
pub(crate) struct Transaction {
    id: TransactionId,
    state: TransactionState,
    writes: HashMap<(String, RecordId), PendingWrite>,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            writes: HashMap::new(),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    pub(crate) fn put(&mut self, table: &str, id: RecordId, values: FieldMap) -> StoreResult<()> {
        self.ensure_active()?;
        self.writes
            .insert((table.to_string(), id), PendingWrite::Put { values });
        Ok(())
    }

    pub(crate) fn delete(&mut self, table: &str, id: RecordId) -> StoreResult<()> {
        self.ensure_active()?;
        self.writes.insert((table.to_string(), id), PendingWrite::Delete);
        Ok(())
    }

    pub(crate) fn pending(&self, table: &str, id: RecordId) -> Option<&PendingWrite> {
        self.writes.get(&(table.to_string(), id))
    }

    /// Pending writes touching one table.
    pub(crate) fn pending_in(
        &self,
        table: &str,
    ) -> impl Iterator<Item = (RecordId, &PendingWrite)> + '_ {
        let table = table.to_string();
        self.writes
            .iter()
            .filter(move |((t, _), _)| *t == table)
            .map(|((_, id), w)| (*id, w))
    }

    pub(crate) fn take_writes(&mut self) -> HashMap<(String, RecordId), PendingWrite> {
        std::mem::take(&mut self.writes)
    }

    pub(crate) fn write_count(&self) -> usize {
        self.writes.len()
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    pub(crate) fn mark_rolled_back(&mut self) {
        self.state = TransactionState::RolledBack;
        self.writes.clear();
    }

    pub(crate) fn ensure_active(&self) -> StoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            state => Err(StoreError::TransactionNotActive { id: self.id, state }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yep_value::field_map;

    fn create_txn() -> Transaction {
        Transaction::new(TransactionId::new(1))
    }

    #[test]
    fn new_transaction_is_active() {
        let txn = create_txn();
        assert!(txn.is_active());
        assert_eq!(txn.write_count(), 0);
    }

    #[test]
    fn later_write_replaces_earlier() {
        let mut txn = create_txn();
        let id = RecordId::new(1);
        txn.put("t", id, field_map! { "a" => 1 }).unwrap();
        txn.delete("t", id).unwrap();
        assert_eq!(txn.pending("t", id), Some(&PendingWrite::Delete));
        assert_eq!(txn.write_count(), 1);
    }

    #[test]
    fn rolled_back_rejects_writes() {
        let mut txn = create_txn();
        txn.mark_rolled_back();
        let err = txn.put("t", RecordId::new(1), FieldMap::new()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::TransactionNotActive {
                state: TransactionState::RolledBack,
                ..
            }
        ));
    }

    #[test]
    fn pending_in_filters_by_table() {
        let mut txn = create_txn();
        txn.put("a", RecordId::new(1), FieldMap::new()).unwrap();
        txn.put("b", RecordId::new(2), FieldMap::new()).unwrap();
        let ids: Vec<_> = txn.pending_in("a").map(|(id, _)| id).collect();
        assert_eq!(ids, vec![RecordId::new(1)]);
    }
}
