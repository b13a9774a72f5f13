use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickQueueEntry {
    pub object: ObjectId,
    pub due: u64,
}

/// Deferred per-object updates, kept sorted by due time.
///
/// Insertion is a linear scan for the first later entry, so entries with
/// equal due times keep their insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickQueue {
    entries: VecDeque<TickQueueEntry>,
}

impl TickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: ObjectId, due: u64) {
        let index = self
            .entries
            .iter()
            .position(|e| e.due > due)
            .unwrap_or(self.entries.len());
        self.entries.insert(index, TickQueueEntry { object, due });
    }

    /// Pop the head if it is due at `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<TickQueueEntry> {
        if self.entries.front().is_some_and(|e| e.due <= now) {
            self.entries.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TickQueueEntry> {
        self.entries.iter()
    }

    pub fn is_sorted(&self) -> bool {
        self.entries
            .iter()
            .zip(self.entries.iter().skip(1))
            .all(|(a, b)| a.due <= b.due)
    }
}
