//! Bounded content cache for the VFS.
//!
//! Entries are kept newest first. Once the cache holds `capacity` entries the
//! oldest *inserted* entry is evicted, regardless of how recently it was read.

use std::collections::VecDeque;
use std::sync::Arc;

/// Default number of cached buffers.
pub const DEFAULT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct ContentCache {
    entries: VecDeque<(String, Arc<[u8]>)>,
    capacity: usize,
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ContentCache {
    /// A capacity of `0` is bumped to `1`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity + 1), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact-key lookup. Does not affect eviction order.
    pub fn lookup(&self, key: &str) -> Option<Arc<[u8]>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, data)| Arc::clone(data))
    }

    /// Inserts `data` under `key` as the newest entry and returns the buffer
    /// evicted to make room, if any.
    pub fn insert(&mut self, key: impl Into<String>, data: Arc<[u8]>) -> Option<Arc<[u8]>> {
        self.entries.push_front((key.into(), data));
        if self.entries.len() > self.capacity {
            self.entries.pop_back().map(|(_, evicted)| evicted)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
