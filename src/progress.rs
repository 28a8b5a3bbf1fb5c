//! Progress tracking for cook passes.
//!
//! Each shard owns one slot and only ever raises it; the overall value is the
//! average over all slots. Updates use relaxed atomics: the value is advisory
//! (UI polling) and never drives correctness.

use std::sync::atomic::{AtomicU32, Ordering};

/// Shared progress of a cook run, readable from any thread.
#[derive(Debug)]
pub struct CookProgress {
    shards: Box<[AtomicU32]>,
}

impl CookProgress {
    pub fn new(shards: usize) -> Self {
        Self { shards: (0..shards.max(1)).map(|_| AtomicU32::new(0)).collect() }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Raises the slot of `shard` to `percent` (clamped to 100). Lower values
    /// are ignored, keeping progress monotonic.
    pub fn advance(&self, shard: usize, percent: u32) {
        if let Some(slot) = self.shards.get(shard) {
            slot.fetch_max(percent.min(100), Ordering::Relaxed);
        }
    }

    /// Marks a shard as finished.
    pub fn complete(&self, shard: usize) {
        self.advance(shard, 100);
    }

    /// Overall progress in `[0, 100]`; `100` means every shard finished.
    pub fn percent(&self) -> u32 {
        let total: u32 = self.shards.iter().map(|s| s.load(Ordering::Relaxed)).sum();
        total / self.shards.len() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.percent() == 100
    }

    /// Drops every slot back to `0` at the start of a new pass.
    pub fn reset(&self) {
        for slot in self.shards.iter() {
            slot.store(0, Ordering::Relaxed);
        }
    }
}

/// Progress after starting item `i` of `n`: `i * 100 / n`, and exactly
/// `100` for the last item.
pub fn step_percent(i: usize, n: usize) -> u32 {
    if i + 1 >= n {
        100
    } else {
        (i * 100 / n) as u32
    }
}
