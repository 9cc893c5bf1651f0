//! Per-thread scratch buffers with stack-discipline reuse.
//!
//! Batch-local temporaries (sorted entries, radiance staging, shade-queue
//! spans) come out of a per-thread arena and go back at deterministic
//! points, so the scratch footprint stays bounded regardless of batch
//! size. Buffers are recycled by element type; hit/miss counters expose
//! how well reuse is working.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Watermark of outstanding scratch buffers, used to verify that a phase
/// returned everything it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bookmark {
    outstanding: usize,
}

/// Per-thread scratch allocator. Not shared across threads; each render
/// thread owns exactly one.
#[derive(Default)]
pub struct ScratchArena {
    free: HashMap<TypeId, Vec<Box<dyn Any + Send>>>,
    hit_count: usize,
    miss_count: usize,
    outstanding: usize,
}

impl ScratchArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take an empty buffer with at least `capacity` reserved, reusing a
    /// previously released one when available.
    pub fn acquire<T: Send + 'static>(&mut self, capacity: usize) -> Vec<T> {
        self.outstanding += 1;
        if let Some(pool) = self.free.get_mut(&TypeId::of::<Vec<T>>()) {
            if let Some(boxed) = pool.pop() {
                self.hit_count += 1;
                let mut buf = *boxed.downcast::<Vec<T>>().expect("scratch pool type mismatch");
                buf.reserve(capacity);
                return buf;
            }
        }
        self.miss_count += 1;
        Vec::with_capacity(capacity)
    }

    /// Return a buffer to the arena. Contents are dropped; capacity is
    /// kept for reuse.
    pub fn release<T: Send + 'static>(&mut self, mut buf: Vec<T>) {
        assert!(self.outstanding > 0, "scratch release without acquire");
        self.outstanding -= 1;
        buf.clear();
        self.free
            .entry(TypeId::of::<Vec<T>>())
            .or_default()
            .push(Box::new(buf));
    }

    /// Snapshot the outstanding-buffer watermark at a phase boundary.
    pub fn mark(&self) -> Bookmark {
        Bookmark {
            outstanding: self.outstanding,
        }
    }

    /// Verify that everything acquired since `bookmark` has been released.
    pub fn check_restored(&self, bookmark: Bookmark) {
        debug_assert_eq!(
            self.outstanding, bookmark.outstanding,
            "scratch buffers leaked past a phase boundary"
        );
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn log_stats(&self) {
        let total = self.hit_count + self.miss_count;
        let hit_rate = if total > 0 {
            self.hit_count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        log::debug!(
            "scratch arena: {:.1}% hit rate ({} hits, {} misses), {} outstanding",
            hit_rate,
            self.hit_count,
            self.miss_count,
            self.outstanding
        );
    }
}
