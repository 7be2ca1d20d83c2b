//! Optimistic record of locally issued, not-yet-acked mutations.
//!
//! Reads through this layer see the local client's own writes immediately,
//! before the ordering service acks them. Entries live exactly as long as
//! the key has unacked writes: every local set/delete bumps a per-key count,
//! every ack decrements it, and the entry is dropped at zero, by which
//! point the sequenced layer holds the same information.

use std::collections::HashMap;

use bytes::Bytes;

use crate::CacheRead;

#[derive(Debug)]
struct PendingEntry {
    latest_value: Option<Bytes>,
    is_deleted: bool,
    update_seq: u64,
    unacked: u32,
}

/// O(1) overlay of unacked local mutations.
#[derive(Debug, Default)]
pub struct PendingState {
    entries: HashMap<String, PendingEntry>,
    pending_clear_count: u32,
    latest_clear_seq: u64,
    update_seq: u64,
}

impl PendingState {
    /// Records a locally issued set.
    pub fn set(&mut self, key: &str, value: Bytes) {
        self.update_seq += 1;
        let entry = self.entries.entry(key.to_string()).or_insert(PendingEntry {
            latest_value: None,
            is_deleted: false,
            update_seq: 0,
            unacked: 0,
        });
        entry.latest_value = Some(value);
        entry.is_deleted = false;
        entry.update_seq = self.update_seq;
        entry.unacked += 1;
    }

    /// Records a locally issued delete.
    pub fn delete(&mut self, key: &str) {
        self.update_seq += 1;
        let entry = self.entries.entry(key.to_string()).or_insert(PendingEntry {
            latest_value: None,
            is_deleted: false,
            update_seq: 0,
            unacked: 0,
        });
        entry.latest_value = None;
        entry.is_deleted = true;
        entry.update_seq = self.update_seq;
        entry.unacked += 1;
    }

    /// Records a locally issued clear. A clear dominates every pending write
    /// issued before it.
    pub fn clear(&mut self) {
        self.update_seq += 1;
        self.pending_clear_count += 1;
        self.latest_clear_seq = self.update_seq;
    }

    /// Reads `key` against the pending overlay.
    pub fn get(&self, key: &str) -> CacheRead {
        match self.entries.get(key) {
            Some(entry) => {
                if self.pending_clear_count > 0 && entry.update_seq <= self.latest_clear_seq {
                    return CacheRead::Absent;
                }
                if entry.is_deleted {
                    return CacheRead::Absent;
                }
                match &entry.latest_value {
                    Some(value) => CacheRead::Hit(value.clone()),
                    None => CacheRead::Absent,
                }
            },
            None if self.pending_clear_count > 0 => CacheRead::Absent,
            None => CacheRead::Miss,
        }
    }

    /// Acks one local set/delete for `key`. Once every local write for the
    /// key is acked, the entry is evicted.
    pub fn ack_modify(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.unacked = entry.unacked.saturating_sub(1);
            if entry.unacked == 0 {
                self.entries.remove(key);
            }
        }
    }

    /// Acks one local clear.
    pub fn ack_clear(&mut self) {
        self.pending_clear_count = self.pending_clear_count.saturating_sub(1);
    }

    /// Number of keys with pending writes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any local write or clear is unacked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.pending_clear_count == 0
    }
}
