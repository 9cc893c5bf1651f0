//! Reference-counted handle pools for deferred per-ray payloads.
//!
//! Occlusion-data lists, deep output data and cryptomatte data outlive the
//! ray that created them: they ride along on radiance records into the
//! result sink. They are modeled as small refcounted handles into a
//! per-thread pool with explicit `acquire`/`release` so that the release
//! point in each triage branch is an observable event, not an incidental
//! scope exit. Releasing a dead handle or re-freeing an empty slot is a
//! contract violation and panics.

use glam::Vec3;

/// Index-based handle into a [`HandlePool`]. `Handle::NULL` means "no
/// payload attached".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u32);

impl Handle {
    pub const NULL: Handle = Handle(u32::MAX);

    pub fn is_null(self) -> bool {
        self == Handle::NULL
    }
}

struct Slot<T> {
    value: Option<T>,
    refs: u32,
}

/// Pool of refcounted payloads, owned by one thread's execution context.
///
/// No internal locking: the owning thread inserts and releases; handles
/// that travel on radiance records come back to the same thread's pool.
pub struct HandlePool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    outstanding: usize,
}

impl<T> Default for HandlePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandlePool<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            outstanding: 0,
        }
    }

    /// Store a payload with an initial reference count of 1.
    pub fn insert(&mut self, value: T) -> Handle {
        self.outstanding += 1;
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            debug_assert!(slot.value.is_none());
            slot.value = Some(value);
            slot.refs = 1;
            Handle(idx)
        } else {
            self.slots.push(Slot {
                value: Some(value),
                refs: 1,
            });
            Handle((self.slots.len() - 1) as u32)
        }
    }

    /// Add a reference. Passing `Handle::NULL` is a no-op and returns NULL,
    /// so call sites can forward optional payloads unconditionally.
    pub fn acquire(&mut self, handle: Handle) -> Handle {
        if handle.is_null() {
            return Handle::NULL;
        }
        let slot = &mut self.slots[handle.0 as usize];
        assert!(slot.value.is_some(), "acquire on dead handle {}", handle.0);
        slot.refs += 1;
        self.outstanding += 1;
        handle
    }

    /// Drop a reference, freeing the payload when the count reaches zero.
    /// `Handle::NULL` is a no-op.
    pub fn release(&mut self, handle: Handle) {
        if handle.is_null() {
            return;
        }
        let slot = &mut self.slots[handle.0 as usize];
        assert!(slot.value.is_some(), "release on dead handle {}", handle.0);
        assert!(slot.refs > 0, "refcount underflow on handle {}", handle.0);
        slot.refs -= 1;
        self.outstanding -= 1;
        if slot.refs == 0 {
            slot.value = None;
            self.free.push(handle.0);
        }
    }

    pub fn get(&self, handle: Handle) -> &T {
        self.slots[handle.0 as usize]
            .value
            .as_ref()
            .expect("get on dead handle")
    }

    /// Number of live references across all slots. Zero after a leak-free
    /// batch.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }
}

/// One entry of an occlusion data list: which light the shadow ray targets
/// plus the bookkeeping needed for AOV/LPE accumulation.
#[derive(Debug, Clone, Copy)]
pub struct OcclData {
    /// Index of the light in the frame's light scene.
    pub light: usize,
    pub ray_epsilon: f32,
    /// LPE automaton state this contribution accumulates under.
    pub lpe_state_id: i32,
}

/// Data-list payload carried by a [`crate::records::BundledOcclRay`].
pub type OcclDataList = Vec<OcclData>;

/// Deferred deep-output samples for one ray.
#[derive(Debug, Clone, Default)]
pub struct DeepData {
    pub pixel: u32,
    pub samples: Vec<f32>,
}

/// Deferred cryptomatte coverage data for one ray.
#[derive(Debug, Clone, Default)]
pub struct CryptomatteData {
    pub pixel: u32,
    pub id: f32,
    pub weight: f32,
    pub position: Vec3,
}
