use std::collections::BTreeMap;

use crate::domain::Punch;

/// Session-scoped punch collection keyed by punch id.
///
/// Tracks the highest id seen (the incremental `lastId` cursor) and how many
/// records were inserted since the last successful flush.
#[derive(Debug, Clone, Default)]
pub struct PunchStore {
    punches: BTreeMap<i64, Punch>,
    cursor: i64,
    pending_writes: usize,
}

impl PunchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(cursor: i64) -> Self {
        Self {
            cursor,
            ..Self::default()
        }
    }

    /// Returns `true` when `punch.id` was not stored yet.
    pub fn insert_if_absent(&mut self, punch: Punch) -> bool {
        if self.punches.contains_key(&punch.id) {
            return false;
        }
        self.punches.insert(punch.id, punch);
        self.pending_writes += 1;
        true
    }

    pub fn maybe_advance_cursor(&mut self, id: i64) {
        self.cursor = self.cursor.max(id);
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// All punches in ascending id order.
    pub fn snapshot(&self) -> Vec<Punch> {
        self.punches.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.punches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.punches.is_empty()
    }

    pub fn pending_writes(&self) -> usize {
        self.pending_writes
    }

    pub fn take_pending_writes(&mut self) -> usize {
        std::mem::take(&mut self.pending_writes)
    }

    /// Puts back a count taken for a flush that did not reach the disk.
    pub fn requeue_pending(&mut self, count: usize) {
        self.pending_writes += count;
    }
}
