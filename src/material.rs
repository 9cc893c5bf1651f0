//! Material resolution and per-material shade queues.

use crate::ray::{RayHit, RayType};

/// Entry submitted to a shade queue: the ray-state pool index plus a
/// locality sort key built from (geometry id, primitive id).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortedRayEntry {
    pub sort_key: u32,
    pub rs_idx: u32,
}

impl SortedRayEntry {
    /// Secondary key grouping by geometry then primitive, to improve
    /// locality of downstream shading work.
    pub fn locality_key(hit: &RayHit) -> u32 {
        ((hit.geom_id & 0xfff) << 20) | (hit.prim_id & 0xfffff)
    }
}

/// Thread-safe collection point where hit rays await material evaluation.
/// `submit` may be called concurrently from many render threads; internal
/// synchronization is the queue's responsibility.
pub trait ShadeQueue: Send + Sync {
    fn submit(&self, entries: &[SortedRayEntry]);
}

/// A resolved, shadeable material.
pub trait ShadingMaterial: Send + Sync {
    /// Stable nonzero identifier, dense enough to bucket-sort on.
    fn material_id(&self) -> u32;

    fn shade_queue(&self) -> &dyn ShadeQueue;
}

/// Maps a geometry hit to its shading material, applying any ray-type
/// substitution. `None` means the hit point has no material bound and the
/// ray terminates.
pub trait MaterialResolver: Send + Sync {
    fn resolve(&self, hit: &RayHit, ray_type: RayType) -> Option<&dyn ShadingMaterial>;
}
