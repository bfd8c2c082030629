//! Database operations over the ordered index.
//!
//! `Database` owns the record index and implements the hierarchical
//! get/set/delete operations the command layer invokes. Lookups probe
//! with borrowed keys; only stored records hold owned keys. Every
//! operation also maintains the shared statistics counters, including
//! the live-allocation gauge (one stored record counts its key and its
//! value, two allocations).

use std::cmp::Ordering;
use std::rc::Rc;

use crate::stats::StatCounters;
use crate::storage::rbtree::{IndexError, InsertOutcome, RbTree};
use crate::storage::record::{KeySegments, ProbeKey, RecordKey, RecordValue, compare_keys};

type KeyCmp = fn(&RecordKey, &RecordKey) -> Ordering;

/// The ordered record index, keyed by the hierarchical comparator.
pub type RecordIndex = RbTree<RecordKey, RecordValue, KeyCmp>;

/// In-memory hierarchical key-value store.
pub struct Database {
    index: RecordIndex,
    stats: Rc<StatCounters>,
}

impl Database {
    #[must_use]
    pub fn new(stats: Rc<StatCounters>) -> Self {
        let cmp: KeyCmp = compare_keys::<RecordKey, RecordKey>;
        Self {
            index: RbTree::new(cmp),
            stats,
        }
    }

    /// Number of stored records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Point lookup. An empty segment never matches anything, so it
    /// reports a miss without touching the index.
    pub fn hget(&self, table: &[u8], key: &[u8], field: &[u8]) -> Option<&RecordValue> {
        if table.is_empty() || key.is_empty() || field.is_empty() {
            return None;
        }
        let probe = ProbeKey::new(table, key, field);
        let id = self.index.find_by(|stored| compare_keys(&probe, stored))?;
        self.stats.record_get();
        Some(self.index.value(id))
    }

    /// Point delete: same lookup as [`Database::hget`], then erase.
    /// Returns the removed value.
    pub fn hdel(&mut self, table: &[u8], key: &[u8], field: &[u8]) -> Option<RecordValue> {
        if table.is_empty() || key.is_empty() || field.is_empty() {
            return None;
        }
        let probe = ProbeKey::new(table, key, field);
        let id = self.index.find_by(|stored| compare_keys(&probe, stored))?;
        let (_key, value) = self.index.remove(id);
        self.stats.record_delete();
        self.stats.adjust_allocations(-2);
        Some(value)
    }

    /// All field/value pairs stored under `(table, key)`, in field
    /// order. Starts a lower-bound scan at the empty field, the
    /// minimum possible field under the segment ordering, and walks
    /// forward until the table or key changes.
    pub fn hgetall(&self, table: &[u8], key: &[u8]) -> Vec<(&[u8], &RecordValue)> {
        let mut out = Vec::new();
        if table.is_empty() || key.is_empty() {
            return out;
        }
        let probe = ProbeKey::new(table, key, b"");
        let mut cur = self
            .index
            .lower_bound_by(|stored| compare_keys(&probe, stored));
        while let Some(id) = cur {
            let (stored, value) = self.index.key_value(id);
            if stored.table() != probe.table() || stored.key() != probe.key() {
                break;
            }
            self.stats.record_get();
            out.push((stored.field(), value));
            cur = self.index.next(id);
        }
        out
    }

    /// Erase every record under `(table, key)`. Returns the number of
    /// records removed.
    pub fn hdelall(&mut self, table: &[u8], key: &[u8]) -> usize {
        if table.is_empty() || key.is_empty() {
            return 0;
        }
        let probe = ProbeKey::new(table, key, b"");
        let mut removed = 0;
        loop {
            let Some(id) = self
                .index
                .lower_bound_by(|stored| compare_keys(&probe, stored))
            else {
                break;
            };
            {
                let stored = self.index.key(id);
                if stored.table() != probe.table() || stored.key() != probe.key() {
                    break;
                }
            }
            self.index.remove(id);
            self.stats.record_delete();
            self.stats.adjust_allocations(-2);
            removed += 1;
        }
        removed
    }

    /// Bulk insert/replace of field/value pairs under `(table, key)`.
    ///
    /// A fresh insert counts as a set; displacing an existing record
    /// counts as an update and drops the displaced pair here. An empty
    /// table or key makes the whole call a no-op.
    pub fn hset<F, I>(&mut self, table: &[u8], key: &[u8], fields: I) -> Result<(), IndexError>
    where
        F: AsRef<[u8]>,
        I: IntoIterator<Item = (F, RecordValue)>,
    {
        if table.is_empty() || key.is_empty() {
            return Ok(());
        }
        for (field, value) in fields {
            let record_key = RecordKey::new(table, key, field.as_ref());
            match self.index.insert(record_key, value)? {
                InsertOutcome::Inserted(_) => {
                    self.stats.record_set();
                    self.stats.adjust_allocations(2);
                }
                InsertOutcome::Replaced { .. } => {
                    // Displaced pair dropped here; the new key and value
                    // replace it, so the gauge is unchanged.
                    self.stats.record_update();
                }
            }
        }
        Ok(())
    }
}
