//! In-memory transactional store.

use crate::error::{StoreError, StoreResult};
use crate::stats::{StatsSnapshot, StoreStats};
use crate::store::Store;
use crate::transaction::{PendingWrite, Transaction, TransactionId};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;
use yep_value::{FieldMap, RecordId};

/// One committed table.
#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<RecordId, FieldMap>,
    last_id: i64,
}

/// A transactional in-memory store.
///
/// This store keeps all rows in memory and is suitable for:
/// - Unit and integration tests
/// - Benchmarks of the object layer without I/O noise
///
/// # Isolation
///
/// Each transaction buffers its writes; other transactions see them only
/// after commit. Concurrent writers to the same row are not detected: the
/// last commit wins.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads. Locks are
/// always taken in the order transactions, then tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    txns: Mutex<HashMap<TransactionId, Transaction>>,
    next_txid: AtomicU64,
    stats: StoreStats,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed rows in a table.
    #[must_use]
    pub fn committed_len(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, |t| t.rows.len())
    }

    /// Returns the number of transactions still open.
    #[must_use]
    pub fn open_transactions(&self) -> usize {
        self.txns.lock().len()
    }

    fn with_txn<T>(
        &self,
        tx: TransactionId,
        f: impl FnOnce(&mut Transaction) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut txns = self.txns.lock();
        let txn = txns
            .get_mut(&tx)
            .ok_or(StoreError::UnknownTransaction(tx))?;
        txn.ensure_active()?;
        f(txn)
    }

    fn current_row(&self, txn: &Transaction, table: &str, id: RecordId) -> Option<FieldMap> {
        match txn.pending(table, id) {
            Some(PendingWrite::Put { values }) => Some(values.clone()),
            Some(PendingWrite::Delete) => None,
            None => self
                .tables
                .read()
                .get(table)
                .and_then(|t| t.rows.get(&id).cloned()),
        }
    }
}

impl Store for MemoryStore {
    fn begin(&self) -> StoreResult<TransactionId> {
        let id = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst) + 1);
        self.txns.lock().insert(id, Transaction::new(id));
        trace!(%id, "transaction started");
        Ok(id)
    }

    fn commit(&self, tx: TransactionId) -> StoreResult<()> {
        let mut txn = self
            .txns
            .lock()
            .remove(&tx)
            .ok_or(StoreError::UnknownTransaction(tx))?;
        txn.ensure_active()?;

        let writes = txn.take_writes();
        let count = writes.len();
        let mut tables = self.tables.write();
        for ((table, id), write) in writes {
            let table = tables.entry(table).or_default();
            match write {
                PendingWrite::Put { values } => {
                    table.rows.insert(id, values);
                }
                PendingWrite::Delete => {
                    table.rows.remove(&id);
                }
            }
        }
        txn.mark_committed();
        self.stats.record_commit();
        trace!(%tx, writes = count, "transaction committed");
        Ok(())
    }

    fn rollback(&self, tx: TransactionId) -> StoreResult<()> {
        let mut txn = self
            .txns
            .lock()
            .remove(&tx)
            .ok_or(StoreError::UnknownTransaction(tx))?;
        txn.ensure_active()?;
        txn.mark_rolled_back();
        self.stats.record_rollback();
        trace!(%tx, "transaction rolled back");
        Ok(())
    }

    fn insert(&self, tx: TransactionId, table: &str, values: FieldMap) -> StoreResult<RecordId> {
        self.with_txn(tx, |txn| {
            // Ids are allocated eagerly so that they are never reused, even
            // when the inserting transaction rolls back.
            let id = {
                let mut tables = self.tables.write();
                let t = tables.entry(table.to_string()).or_default();
                t.last_id += 1;
                RecordId::new(t.last_id)
            };
            txn.put(table, id, values)?;
            self.stats.record_insert();
            Ok(id)
        })
    }

    fn update(
        &self,
        tx: TransactionId,
        table: &str,
        id: RecordId,
        values: &FieldMap,
    ) -> StoreResult<()> {
        self.with_txn(tx, |txn| {
            let mut row = self
                .current_row(txn, table, id)
                .ok_or_else(|| StoreError::record_not_found(table, id))?;
            row.merge(values.clone());
            txn.put(table, id, row)?;
            self.stats.record_update();
            Ok(())
        })
    }

    fn delete(&self, tx: TransactionId, table: &str, id: RecordId) -> StoreResult<()> {
        self.with_txn(tx, |txn| {
            txn.delete(table, id)?;
            self.stats.record_delete();
            Ok(())
        })
    }

    fn get(&self, tx: TransactionId, table: &str, id: RecordId) -> StoreResult<Option<FieldMap>> {
        self.with_txn(tx, |txn| {
            self.stats.record_read();
            Ok(self.current_row(txn, table, id))
        })
    }

    fn ids(&self, tx: TransactionId, table: &str) -> StoreResult<Vec<RecordId>> {
        self.with_txn(tx, |txn| {
            let mut ids: BTreeSet<RecordId> = self
                .tables
                .read()
                .get(table)
                .map(|t| t.rows.keys().copied().collect())
                .unwrap_or_default();
            for (id, write) in txn.pending_in(table) {
                match write {
                    PendingWrite::Put { .. } => ids.insert(id),
                    PendingWrite::Delete => ids.remove(&id),
                };
            }
            self.stats.record_scan();
            Ok(ids.into_iter().collect())
        })
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yep_value::{field_map, Value};

    #[test]
    fn insert_is_visible_to_own_transaction_only() {
        let store = MemoryStore::new();
        let tx1 = store.begin().unwrap();
        let tx2 = store.begin().unwrap();
        let id = store.insert(tx1, "t", field_map! { "a" => 1 }).unwrap();

        assert!(store.get(tx1, "t", id).unwrap().is_some());
        assert!(store.get(tx2, "t", id).unwrap().is_none());
        assert_eq!(store.ids(tx2, "t").unwrap(), Vec::<RecordId>::new());

        store.commit(tx1).unwrap();
        assert!(store.get(tx2, "t", id).unwrap().is_some());
    }

    #[test]
    fn rollback_discards_writes_but_not_ids() {
        let store = MemoryStore::new();
        let tx = store.begin().unwrap();
        let first = store.insert(tx, "t", FieldMap::new()).unwrap();
        store.rollback(tx).unwrap();

        let tx = store.begin().unwrap();
        assert!(store.ids(tx, "t").unwrap().is_empty());
        let second = store.insert(tx, "t", FieldMap::new()).unwrap();
        assert!(second > first);
    }

    #[test]
    fn update_merges_values() {
        let store = MemoryStore::new();
        let tx = store.begin().unwrap();
        let id = store
            .insert(tx, "t", field_map! { "a" => 1, "b" => "x" })
            .unwrap();
        store.update(tx, "t", id, &field_map! { "a" => 2 }).unwrap();
        let row = store.get(tx, "t", id).unwrap().unwrap();
        assert_eq!(row.get("a"), Some(&Value::Integer(2)));
        assert_eq!(row.get("b"), Some(&Value::Text("x".into())));
    }

    #[test]
    fn update_missing_row_fails() {
        let store = MemoryStore::new();
        let tx = store.begin().unwrap();
        let err = store
            .update(tx, "t", RecordId::new(9), &FieldMap::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound { .. }));
    }

    #[test]
    fn delete_hides_committed_row() {
        let store = MemoryStore::new();
        let tx = store.begin().unwrap();
        let id = store.insert(tx, "t", FieldMap::new()).unwrap();
        store.commit(tx).unwrap();

        let tx = store.begin().unwrap();
        store.delete(tx, "t", id).unwrap();
        assert!(store.ids(tx, "t").unwrap().is_empty());
        assert_eq!(store.committed_len("t"), 1);
        store.commit(tx).unwrap();
        assert_eq!(store.committed_len("t"), 0);
    }

    #[test]
    fn finished_transaction_is_unknown() {
        let store = MemoryStore::new();
        let tx = store.begin().unwrap();
        store.commit(tx).unwrap();
        assert!(matches!(
            store.ids(tx, "t"),
            Err(StoreError::UnknownTransaction(_))
        ));
        assert_eq!(store.open_transactions(), 0);
    }

    #[test]
    fn stats_count_writes() {
        let store = MemoryStore::new();
        let tx = store.begin().unwrap();
        let id = store.insert(tx, "t", FieldMap::new()).unwrap();
        store.update(tx, "t", id, &field_map! { "a" => 1 }).unwrap();
        store.commit(tx).unwrap();
        let stats = store.stats();
        assert_eq!(stats.writes(), 2);
        assert_eq!(stats.commits, 1);
    }

    proptest::proptest! {
        #[test]
        fn committed_ids_match_applied_operations(
            ops in proptest::collection::vec((proptest::bool::ANY, 0usize..16), 0..40)
        ) {
            let store = MemoryStore::new();
            let tx = store.begin().unwrap();
            let mut live = BTreeSet::new();
            for (insert, pick) in ops {
                if insert || live.is_empty() {
                    live.insert(store.insert(tx, "t", FieldMap::new()).unwrap());
                } else {
                    let id = *live.iter().nth(pick % live.len()).unwrap();
                    store.delete(tx, "t", id).unwrap();
                    live.remove(&id);
                }
            }
            store.commit(tx).unwrap();

            let tx = store.begin().unwrap();
            let ids = store.ids(tx, "t").unwrap();
            proptest::prop_assert_eq!(ids, live.into_iter().collect::<Vec<_>>());
        }
    }
}
