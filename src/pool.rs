//! Global, index-addressable pool of [`RayState`] records.
//!
//! Arena+index pattern: a fixed-capacity slab with externally tracked
//! liveness. Handlers refer to rays by pool index; exactly one thread owns
//! a given live index at a time, and ownership moves either to a shade
//! queue or back to the pool. Bulk allocation and free are safe to call
//! concurrently from multiple render threads; double frees panic.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{ensure, Result};

use crate::error::{CoreError, CoreResult};
use crate::ray::RayState;

pub struct RayStatePool {
    slots: Box<[UnsafeCell<RayState>]>,
    live: Box<[AtomicBool]>,
    free: Mutex<Vec<u32>>,
}

// Slots are plain data; the single-owner contract on live indices prevents
// cross-thread aliasing of any one slot.
unsafe impl Send for RayStatePool {}
unsafe impl Sync for RayStatePool {}

impl RayStatePool {
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        ensure!(capacity > 0, "ray state pool capacity must be nonzero");
        ensure!(
            capacity < u32::MAX as usize,
            "ray state pool capacity {} exceeds index range",
            capacity
        );

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(RayState::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let live = (0..capacity)
            .map(|_| AtomicBool::new(false))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        // Hand out low indices first.
        let free = (0..capacity as u32).rev().collect();

        Ok(Self {
            slots,
            live,
            free: Mutex::new(free),
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Allocate `n` ray states in bulk. The returned indices are owned by
    /// the caller until freed or forwarded to a shade queue.
    pub fn alloc_bulk(&self, n: usize) -> CoreResult<Vec<u32>> {
        let mut free = self.free.lock().expect("ray pool free list poisoned");
        if free.len() < n {
            return Err(CoreError::PoolExhausted {
                requested: n,
                available: free.len(),
            });
        }
        let start = free.len() - n;
        let indices: Vec<u32> = free.drain(start..).collect();
        drop(free);

        for &idx in &indices {
            let was_live = self.live[idx as usize].swap(true, Ordering::Relaxed);
            assert!(!was_live, "allocated an already-live ray state {}", idx);
            // Fresh record for the new ray.
            unsafe { *self.slots[idx as usize].get() = RayState::default() };
        }
        Ok(indices)
    }

    /// Return a batch of ray states to the pool in one operation.
    /// Panics if any index is not currently live (double free).
    pub fn free_bulk(&self, indices: &[u32]) {
        for &idx in indices {
            let was_live = self.live[idx as usize].swap(false, Ordering::Relaxed);
            assert!(was_live, "double free of ray state {}", idx);
        }
        let mut free = self.free.lock().expect("ray pool free list poisoned");
        free.extend_from_slice(indices);
    }

    pub fn is_live(&self, idx: u32) -> bool {
        self.live[idx as usize].load(Ordering::Relaxed)
    }

    /// Number of currently live ray states. Zero after a leak-free frame.
    pub fn live_count(&self) -> usize {
        self.capacity() - self.free.lock().expect("ray pool free list poisoned").len()
    }

    /// Access a ray state by index.
    ///
    /// # Safety
    /// The caller must be the unique owner of `idx` (obtained from
    /// [`alloc_bulk`](Self::alloc_bulk) and not yet freed or forwarded),
    /// and must not hold another reference to the same slot.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn state_mut(&self, idx: u32) -> &mut RayState {
        debug_assert!(self.is_live(idx), "access to dead ray state {}", idx);
        &mut *self.slots[idx as usize].get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_alloc_free_roundtrip() {
        let pool = RayStatePool::with_capacity(8).unwrap();
        let batch = pool.alloc_bulk(5).unwrap();
        assert_eq!(batch.len(), 5);
        assert_eq!(pool.live_count(), 5);
        for &idx in &batch {
            assert!(pool.is_live(idx));
        }
        pool.free_bulk(&batch);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let pool = RayStatePool::with_capacity(4).unwrap();
        let _batch = pool.alloc_bulk(3).unwrap();
        let err = pool.alloc_bulk(2).unwrap_err();
        match err {
            CoreError::PoolExhausted {
                requested,
                available,
            } => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn test_double_free_panics() {
        let pool = RayStatePool::with_capacity(2).unwrap();
        let batch = pool.alloc_bulk(1).unwrap();
        pool.free_bulk(&batch);
        pool.free_bulk(&batch);
    }

    #[test]
    fn test_concurrent_alloc_free() {
        use std::sync::Arc;

        let pool = Arc::new(RayStatePool::with_capacity(1024).unwrap());
        let mut joins = Vec::new();
        for _ in 0..4 {
            let pool = Arc::clone(&pool);
            joins.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    let batch = pool.alloc_bulk(32).unwrap();
                    pool.free_bulk(&batch);
                }
            }));
        }
        for j in joins {
            j.join().unwrap();
        }
        assert_eq!(pool.live_count(), 0);
    }
}
