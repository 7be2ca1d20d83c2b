//! Cache of acked reads and unflushed acked mutations.
//!
//! This layer feeds the flusher: every acked set/delete is appended to an op
//! list until a flush with a covering reference sequence number retires it.
//! Read-through entries cached from the tree carry no op and can be evicted
//! freely; keys with unflushed ops are pinned until their ops are flushed.

use std::collections::{HashMap, HashSet, VecDeque};

use bytes::Bytes;
use hive_types::SequenceNumber;

use crate::CacheRead;

#[derive(Debug)]
struct SequencedOp {
    sequence: SequenceNumber,
    key: String,
    /// `None` records a delete.
    value: Option<Bytes>,
}

/// O(1) cache of acked state with unflushed-op tracking.
#[derive(Debug, Default)]
pub struct SequencedState {
    entries: HashMap<String, Bytes>,
    /// Keys in the order they first entered `entries`; drives eviction.
    insertion_order: VecDeque<String>,
    ops: Vec<SequencedOp>,
    /// Union of keys appearing in `ops`.
    modified: HashSet<String>,
}

impl SequencedState {
    /// Caches a read-through entry. No mutation is implied and the entry is
    /// freely evictable.
    pub fn cache(&mut self, key: &str, value: Bytes) {
        self.insert_entry(key, value);
    }

    /// Records an acked set.
    pub fn set(&mut self, key: &str, value: Bytes, sequence: SequenceNumber) {
        self.ops.push(SequencedOp {
            sequence,
            key: key.to_string(),
            value: Some(value.clone()),
        });
        self.modified.insert(key.to_string());
        self.insert_entry(key, value);
    }

    /// Records an acked delete.
    pub fn delete(&mut self, key: &str, sequence: SequenceNumber) {
        self.ops.push(SequencedOp { sequence, key: key.to_string(), value: None });
        self.modified.insert(key.to_string());
        self.entries.remove(key);
    }

    /// Reads `key` against the acked cache.
    ///
    /// A modified key without a live entry reads as absent (it was deleted,
    /// or its entry was never cached), never as a miss: the op list is
    /// authoritative for modified keys.
    pub fn get(&self, key: &str) -> CacheRead {
        if let Some(value) = self.entries.get(key) {
            return CacheRead::Hit(value.clone());
        }
        if self.modified.contains(key) {
            return CacheRead::Absent;
        }
        CacheRead::Miss
    }

    /// Collapses the op list into a last-writer-wins snapshot without
    /// mutating internal state: deletes cancel prior sets, sets cancel prior
    /// deletes.
    pub fn get_flushable_changes(&self) -> (HashMap<String, Bytes>, HashSet<String>) {
        let mut updates = HashMap::new();
        let mut deletes = HashSet::new();
        for op in &self.ops {
            match &op.value {
                Some(value) => {
                    deletes.remove(&op.key);
                    updates.insert(op.key.clone(), value.clone());
                },
                None => {
                    updates.remove(&op.key);
                    deletes.insert(op.key.clone());
                },
            }
        }
        (updates, deletes)
    }

    /// Retires every op with `sequence <= ref_seq` and rebuilds the modified
    /// set from the remainder. Entries for retired keys become evictable.
    pub fn flush(&mut self, ref_seq: SequenceNumber) {
        self.ops.retain(|op| op.sequence > ref_seq);
        self.modified = self.ops.iter().map(|op| op.key.clone()).collect();
    }

    /// Empties everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
        self.ops.clear();
        self.modified.clear();
    }

    /// Number of keys with unflushed acked changes.
    pub fn unflushed_change_count(&self) -> usize {
        self.modified.len()
    }

    /// Number of live cache entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries eligible for eviction.
    pub fn evictable_len(&self) -> usize {
        self.entries.keys().filter(|key| !self.modified.contains(*key)).count()
    }

    /// Drops up to `target` non-modified entries in insertion order and
    /// returns how many were freed. Modified keys are never evicted.
    pub fn evict(&mut self, target: usize) -> usize {
        let mut freed = 0;
        let mut passes = self.insertion_order.len();
        while freed < target && passes > 0 {
            passes -= 1;
            let Some(key) = self.insertion_order.pop_front() else { break };
            if !self.entries.contains_key(&key) {
                // Deleted since it was queued; nothing to free.
                continue;
            }
            if self.modified.contains(&key) {
                self.insertion_order.push_back(key);
                continue;
            }
            self.entries.remove(&key);
            freed += 1;
        }
        freed
    }

    fn insert_entry(&mut self, key: &str, value: Bytes) {
        if self.entries.insert(key.to_string(), value).is_none() {
            self.insertion_order.push_back(key.to_string());
        }
    }
}
