//! Per-transaction record cache.

use parking_lot::Mutex;
use std::collections::HashMap;
use yep_value::{FieldMap, RecordId, Value};

/// Rows loaded or written during one transaction, keyed by model and id.
///
/// Only column values are cached. Computed and related values that are not
/// stored are evaluated on every read. The cache is shared by every
/// environment derived from the same transaction, so values written under
/// sudo are seen by the caller.
#[derive(Debug, Default)]
pub(crate) struct RecordCache {
    rows: Mutex<HashMap<(String, RecordId), FieldMap>>,
}

impl RecordCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Cached value of one column.
    pub(crate) fn get(&self, model: &str, id: RecordId, field: &str) -> Option<Value> {
        self.rows
            .lock()
            .get(&(model.to_string(), id))
            .and_then(|row| row.get(field).cloned())
    }

    /// Returns true if the row is cached.
    pub(crate) fn contains(&self, model: &str, id: RecordId) -> bool {
        self.rows.lock().contains_key(&(model.to_string(), id))
    }

    /// Caches a full row, replacing any previous one.
    pub(crate) fn insert(&self, model: &str, id: RecordId, row: FieldMap) {
        self.rows.lock().insert((model.to_string(), id), row);
    }

    /// Merges written values into a cached row. Rows not cached are left alone.
    pub(crate) fn update(&self, model: &str, id: RecordId, values: &FieldMap) {
        if let Some(row) = self.rows.lock().get_mut(&(model.to_string(), id)) {
            row.merge(values.clone());
        }
    }

    /// Drops a row.
    pub(crate) fn invalidate(&self, model: &str, id: RecordId) {
        self.rows.lock().remove(&(model.to_string(), id));
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.lock().len()
    }
}
