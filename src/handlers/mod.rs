//! Batch ray handlers: execution contexts plus the shared helpers used by
//! the occlusion, presence, intersection and GPU triage paths.

pub mod gpu;
pub mod intersect;
pub mod occlusion;

use glam::Vec3;

use crate::accel::{CpuAccelerator, GpuOcclusionAccelerator};
use crate::aov::{AovQueue, AovSchema, LightAovs};
use crate::cancel::CancelToken;
use crate::handles::{CryptomatteData, DeepData, HandlePool, OcclDataList};
use crate::light::{Light, LightScene};
use crate::material::MaterialResolver;
use crate::pool::RayStatePool;
use crate::records::{BundledOcclRay, BundledRadiance, RadianceSink};
use crate::scratch::ScratchArena;
use crate::settings::FrameSettings;
use crate::stats::RayStats;
use crate::volume::VolumeIntegrator;

pub use gpu::process_gpu_occlusion_batch;
pub use intersect::process_intersection_batch;
pub use occlusion::{process_occlusion_batch, process_presence_batch};

/// Presence values below this are treated as fully unoccluded.
pub const PRESENCE_EPSILON: f32 = 1.0e-5;

/// Opaque per-call flags forwarded by the external queueing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RayHandlerFlags(pub u32);

impl RayHandlerFlags {
    pub const NONE: RayHandlerFlags = RayHandlerFlags(0);
}

/// Frame-constant collaborator bundle shared read-only by all render
/// threads for the duration of one frame.
pub struct FrameState<'a> {
    pub accel: &'a dyn CpuAccelerator,
    /// Present only when the scheduler routes occlusion work to a GPU.
    pub gpu_accel: Option<&'a dyn GpuOcclusionAccelerator>,
    pub lights: &'a dyn LightScene,
    pub volumes: &'a dyn VolumeIntegrator,
    pub materials: &'a dyn MaterialResolver,
    pub aov_schema: &'a AovSchema,
    pub light_aovs: &'a LightAovs,
    pub aov_queue: &'a dyn AovQueue,
    pub radiance_queue: &'a dyn RadianceSink,
    pub ray_pool: &'a RayStatePool,
    pub cancel: &'a CancelToken,
    pub settings: &'a FrameSettings,
    pub stats: &'a RayStats,
}

/// Per-render-thread execution context: scratch memory plus the handle
/// pools backing deferred per-ray payloads. Never shared across threads.
pub struct RenderTls {
    pub scratch: ScratchArena,
    pub occl_data: HandlePool<OcclDataList>,
    pub deep_data: HandlePool<DeepData>,
    pub cryptomatte_data: HandlePool<CryptomatteData>,
}

impl Default for RenderTls {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderTls {
    pub fn new() -> Self {
        Self {
            scratch: ScratchArena::new(),
            occl_data: HandlePool::new(),
            deep_data: HandlePool::new(),
            cryptomatte_data: HandlePool::new(),
        }
    }

    /// Total live auxiliary handles across all pools. Zero after a
    /// leak-free frame (once the sink has drained its records).
    pub fn outstanding_handles(&self) -> usize {
        self.occl_data.outstanding()
            + self.deep_data.outstanding()
            + self.cryptomatte_data.outstanding()
    }
}

/// Scalar transparency from a transmittance color, used for visibility
/// AOVs and alpha derivation.
pub fn reduce_transparency(tr: Vec3) -> f32 {
    (tr.x + tr.y + tr.z) * (1.0 / 3.0)
}

/// Upstream volume transmittance along a shadow ray.
pub fn get_transmittance(fs: &FrameState, occl_ray: &BundledOcclRay) -> Vec3 {
    fs.volumes.transmittance(&occl_ray.as_ray())
}

/// Partial radiance for an occluded ray inside a light's clear-radius
/// falloff band: full at the clear radius, ramping linearly to zero at
/// `clear_radius + falloff_distance`.
pub fn calculate_shadow_falloff(light: &dyn Light, occlusion_dist: f32, radiance: Vec3) -> Vec3 {
    let falloff = light.clear_radius_falloff_distance();
    debug_assert!(falloff > 0.0);
    let t = ((occlusion_dist - light.clear_radius()) / falloff).clamp(0.0, 1.0);
    radiance * (1.0 - t)
}

/// Build a radiance record from an occlusion entry, acquiring its own
/// references on the deferred payloads (the entry's references are
/// released separately by the triage branch).
pub fn fill_bundled_radiance(tls: &mut RenderTls, occl_ray: &BundledOcclRay) -> BundledRadiance {
    BundledRadiance {
        radiance: [
            occl_ray.radiance.x,
            occl_ray.radiance.y,
            occl_ray.radiance.z,
            0.0,
        ],
        path_pixel_weight: occl_ray.path_pixel_weight,
        pixel: occl_ray.pixel,
        subpixel_index: occl_ray.subpixel_index,
        deep_data: tls.deep_data.acquire(occl_ray.deep_data),
        cryptomatte_data: tls.cryptomatte_data.acquire(occl_ray.cryptomatte_data),
        crypto_ref_p: occl_ray.crypto_ref_p,
        crypto_ref_n: occl_ray.crypto_ref_n,
        crypto_uv: occl_ray.crypto_uv,
        tile_pass: occl_ray.tile_pass,
    }
}

/// Accumulate light AOVs for every item on an occlusion entry's data
/// list. `value` is the contribution, `occlusion` the separately-tracked
/// occlusion factor for unoccluded-prefix variants.
pub fn accum_light_aovs(
    tls: &RenderTls,
    fs: &FrameState,
    occl_ray: &BundledOcclRay,
    value: Vec3,
    occlusion: Option<Vec3>,
    lpe_prefix: u32,
) {
    debug_assert!(!occl_ray.data.is_null());
    for item in tls.occl_data.get(occl_ray.data) {
        fs.aov_queue.accum_light_aov(
            occl_ray.pixel,
            occl_ray.deep_data,
            item.lpe_state_id,
            lpe_prefix,
            value,
            occlusion,
        );
    }
}

/// Accumulate one visibility sample per data-list item.
pub fn accum_visibility_aovs(tls: &RenderTls, fs: &FrameState, occl_ray: &BundledOcclRay, hits: f32) {
    debug_assert!(!occl_ray.data.is_null());
    let num_items = tls.occl_data.get(occl_ray.data).len();
    for _ in 0..num_items {
        fs.aov_queue
            .accum_visibility(occl_ray.pixel, occl_ray.deep_data, hits);
    }
}

/// Accumulate zero-hit visibility attempts for an occluded entry.
pub fn accum_visibility_aovs_occluded(tls: &RenderTls, fs: &FrameState, occl_ray: &BundledOcclRay) {
    debug_assert!(!occl_ray.data.is_null());
    let num_items = tls.occl_data.get(occl_ray.data).len() as u32;
    fs.aov_queue
        .accum_visibility_attempts(occl_ray.pixel, occl_ray.deep_data, num_items);
}

/// Release every deferred payload an occlusion entry carries. Called once
/// per entry by whichever triage path processed it.
pub fn release_occl_handles(tls: &mut RenderTls, occl_ray: &BundledOcclRay) {
    if !occl_ray.data.is_null() {
        tls.occl_data.release(occl_ray.data);
    }
    tls.deep_data.release(occl_ray.deep_data);
    tls.cryptomatte_data.release(occl_ray.cryptomatte_data);
}

/// Release handles riding on computed-but-unsubmitted radiance records
/// when cancellation fires between compute and push.
pub fn release_unsubmitted_records(tls: &mut RenderTls, records: &[BundledRadiance]) {
    for rec in records {
        tls.deep_data.release(rec.deep_data);
        tls.cryptomatte_data.release(rec.cryptomatte_data);
    }
}

/// Spread a phase's measured ticks evenly over the batch's pixels.
pub fn heat_map_bundled_update(fs: &FrameState, ticks: u64, pixels: impl Iterator<Item = u32>, count: usize) {
    if count == 0 {
        return;
    }
    let per_ray = ticks / count as u64;
    for pixel in pixels {
        fs.aov_queue.add_heat_map_ticks(pixel, per_ray);
    }
}
