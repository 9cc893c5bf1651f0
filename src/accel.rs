//! Acceleration-structure capability traits.
//!
//! The core never builds or owns an acceleration structure; it consumes
//! one of two capabilities selected by the external scheduler: a CPU
//! accelerator tested per ray, or a GPU accelerator tested one batch per
//! dispatch.

use bytemuck::{Pod, Zeroable};

use crate::ray::{Ray, RayHit};

/// CPU acceleration structure: per-ray intersection and binary occlusion.
pub trait CpuAccelerator: Send + Sync {
    /// Closest-hit query; `None` when the ray escapes the scene.
    fn intersect(&self, ray: &Ray) -> Option<RayHit>;

    /// Any-hit visibility query over the ray's parametric interval.
    fn occluded(&self, ray: &Ray) -> bool;
}

/// Shadow-ray record marshaled for one batched GPU dispatch.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuRay {
    pub origin: [f32; 3],
    pub tnear: f32,
    pub dir: [f32; 3],
    pub tfar: f32,
    pub time: f32,
    /// Shadow-receiver id for self-shadowing exclusion on the device.
    pub shadow_receiver_id: u32,
    pub _pad: [u32; 2],
}

/// GPU accelerator limited to occlusion queries.
///
/// Full ray-geometry intersection stays CPU-only in this core; see
/// DESIGN.md.
pub trait GpuOcclusionAccelerator: Send + Sync {
    /// Test the whole batch in one dispatch, writing one byte per ray into
    /// `occluded_out` (nonzero = occluded). `occluded_out.len()` equals
    /// `rays.len()`.
    fn occluded_batch(&self, rays: &[GpuRay], occluded_out: &mut [u8]);
}
