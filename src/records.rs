//! Batch-level records: occlusion-test requests, finished radiance
//! contributions, and transient triage entries.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::handles::Handle;
use crate::ray::Ray;

/// How an occlusion entry is to be processed. `ForceNotOccluded` entries
/// had their visibility resolved upstream and must not be tested twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcclTestType {
    Standard,
    ForceNotOccluded,
}

/// Occlusion test request, immutable after construction apart from the
/// radiance slot the triage engines fold transmittance into.
#[derive(Debug, Clone)]
pub struct BundledOcclRay {
    pub origin: Vec3,
    pub dir: Vec3,
    pub tnear: f32,
    pub tfar: f32,
    pub time: f32,
    pub depth: u32,
    /// Radiance already attenuated by everything upstream of the
    /// visibility test.
    pub radiance: Vec3,
    pub occl_test_type: OcclTestType,
    pub shadow_receiver_id: u32,

    pub pixel: u32,
    pub subpixel_index: u32,
    pub sequence_id: u32,
    pub path_pixel_weight: f32,

    /// Occlusion data list (light + epsilon + LPE state per item); NULL
    /// when no AOV bookkeeping is needed.
    pub data: Handle,
    pub deep_data: Handle,
    pub cryptomatte_data: Handle,

    pub crypto_ref_p: Vec3,
    pub crypto_ref_n: Vec3,
    pub crypto_uv: Vec2,
    pub tile_pass: u32,
}

impl BundledOcclRay {
    /// The shadow ray to test.
    pub fn as_ray(&self) -> Ray {
        Ray::new(
            self.origin,
            self.dir,
            self.tnear,
            self.tfar,
            self.time,
            self.depth,
        )
    }
}

/// Finished radiance contribution. Produced once, never mutated after
/// handoff to the sink; handle ownership transfers with it.
#[derive(Debug, Clone)]
pub struct BundledRadiance {
    /// Linear RGB plus alpha. Alpha is derived from path weight and
    /// volume/light opacity rules, never from the RGB channels.
    pub radiance: [f32; 4],
    pub path_pixel_weight: f32,
    pub pixel: u32,
    pub subpixel_index: u32,
    pub deep_data: Handle,
    pub cryptomatte_data: Handle,
    pub crypto_ref_p: Vec3,
    pub crypto_ref_n: Vec3,
    pub crypto_uv: Vec2,
    pub tile_pass: u32,
}

/// Transient per-batch triage entry. Key 0 marks a miss; nonzero keys are
/// stable material identifiers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SortedEntry {
    pub sort_key: u32,
    /// Producing ray state's pool index.
    pub rs_idx: u32,
}

/// Append-only, thread-safe delivery channel for completed radiance
/// contributions.
pub trait RadianceSink: Send + Sync {
    fn push(&self, records: &[BundledRadiance]);
}
