//! Ordered multiset of chunk handles reachable from a tree root.
//!
//! Content addressing means two structurally identical nodes share one
//! handle, so reachability bookkeeping has to count occurrences: a flush that
//! replaces one of two identical leaves removes one occurrence, not both.

use std::collections::BTreeMap;

use hive_types::Handle;

/// Ordered multiset of chunk handles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct HandleSet {
    counts: BTreeMap<Handle, u32>,
}

impl HandleSet {
    /// Adds one occurrence of `handle`.
    pub fn insert(&mut self, handle: Handle) {
        *self.counts.entry(handle).or_insert(0) += 1;
    }

    /// Removes one occurrence of `handle`.
    ///
    /// Removing a handle with no recorded occurrence indicates delta
    /// bookkeeping drift upstream; it is logged and otherwise ignored.
    pub fn remove(&mut self, handle: Handle) {
        match self.counts.get_mut(&handle) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.counts.remove(&handle);
            },
            None => {
                tracing::debug!(%handle, "removing untracked chunk handle");
            },
        }
    }

    /// Enumerates every occurrence in handle order.
    pub fn iter(&self) -> impl Iterator<Item = Handle> + '_ {
        self.counts
            .iter()
            .flat_map(|(handle, count)| std::iter::repeat(*handle).take(*count as usize))
    }
}

impl FromIterator<Handle> for HandleSet {
    fn from_iter<I: IntoIterator<Item = Handle>>(iter: I) -> Self {
        let mut set = Self::default();
        for handle in iter {
            set.insert(handle);
        }
        set
    }
}
