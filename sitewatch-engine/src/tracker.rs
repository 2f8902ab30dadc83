//! Bounded memory of already-processed record identifiers.

use std::collections::{HashSet, VecDeque};

/// Remembers the most recent `capacity` identifiers.
///
/// Once full, inserting a new identifier evicts the oldest one. A record
/// whose id has been evicted can be reported again, so de-duplication only
/// holds within the retained window.
#[derive(Debug, Clone)]
pub struct IdempotencyTracker {
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
}

impl IdempotencyTracker {
    /// Create a tracker holding at most `capacity` identifiers (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity.min(1024)),
            seen: HashSet::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Whether the identifier is currently retained.
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Record an identifier. Returns `true` if it was not already retained.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        self.order.push_back(id.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    /// Number of retained identifiers.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Maximum number of retained identifiers.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}
