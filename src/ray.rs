//! Per-ray records: the ray itself, hit information, path state, and the
//! mutable in-flight `RayState` owned by the global pool.

use glam::{Vec2, Vec3};

use crate::handles::Handle;

/// Invalid geometry/primitive id: the ray missed everything.
pub const INVALID_ID: u32 = u32::MAX;

/// Distance treated as "infinitely far" for visible-light intersection.
pub const INFINITE_LIGHT_DISTANCE: f32 = 1.0e30;

/// Scattering lobe classification carried on the path vertex. The material
/// resolver uses it to substitute materials per ray type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LobeType {
    #[default]
    Camera,
    Mirror,
    Glossy,
    Diffuse,
}

impl LobeType {
    /// Ray-type bucket used for material substitution.
    pub fn ray_type(self) -> RayType {
        match self {
            LobeType::Camera => RayType::Camera,
            LobeType::Mirror => RayType::Mirror,
            LobeType::Glossy | LobeType::Diffuse => RayType::Indirect,
        }
    }
}

/// Ray-type seen by material substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayType {
    Camera,
    Mirror,
    Indirect,
}

/// A ray with its parametric interval and shutter time.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
    pub tnear: f32,
    pub tfar: f32,
    pub time: f32,
    /// Bounce depth; 0 for camera (primary) rays.
    pub depth: u32,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3, tnear: f32, tfar: f32, time: f32, depth: u32) -> Self {
        Self {
            origin,
            dir,
            tnear,
            tfar,
            time,
            depth,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.depth == 0
    }
}

/// Geometry hit written in place by the accelerator.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub geom_id: u32,
    pub prim_id: u32,
    pub t: f32,
}

impl RayHit {
    pub fn none() -> Self {
        Self {
            geom_id: INVALID_ID,
            prim_id: INVALID_ID,
            t: f32::INFINITY,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.geom_id != INVALID_ID
    }
}

/// Path-integration state carried along a ray.
#[derive(Debug, Clone, Copy)]
pub struct PathVertex {
    /// Product of BSDF weights along the path so far.
    pub path_throughput: Vec3,
    /// Weight of this path's contribution to its pixel.
    pub path_pixel_weight: f32,
    /// Depth counting only non-mirror scattering events.
    pub non_mirror_depth: u32,
    pub lobe_type: LobeType,
    /// LPE automaton state after the last scattering event.
    pub lpe_state_id: i32,
    /// Precomputed LPE state for "this ray hits a light next".
    pub lpe_state_id_light: i32,
}

impl Default for PathVertex {
    fn default() -> Self {
        Self {
            path_throughput: Vec3::ONE,
            path_pixel_weight: 1.0,
            non_mirror_depth: 0,
            lobe_type: LobeType::Camera,
            lpe_state_id: -1,
            lpe_state_id_light: -1,
        }
    }
}

/// Pixel/subpixel identity of a sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subpixel {
    /// Packed pixel coordinate (y << 16 | x convention is the caller's).
    pub pixel: u32,
    pub subpixel_index: u32,
}

/// Four independent multiplicative volume attenuation channels.
#[derive(Debug, Clone, Copy)]
pub struct VolumeTransmittance {
    /// Full extinction channel.
    pub e: Vec3,
    /// Hero-wavelength channel.
    pub h: Vec3,
    /// Alpha (compositing) channel.
    pub alpha: Vec3,
    /// Minimum channel.
    pub min: Vec3,
}

impl VolumeTransmittance {
    pub fn clear() -> Self {
        Self {
            e: Vec3::ONE,
            h: Vec3::ONE,
            alpha: Vec3::ONE,
            min: Vec3::ONE,
        }
    }

    /// Combined transmittance applied to carried radiance.
    pub fn combined(&self) -> Vec3 {
        self.e * self.h
    }
}

/// Mutable record for one in-flight ray.
///
/// Exclusively owned by the global [`crate::pool::RayStatePool`]; handlers
/// receive a pool index and either forward ownership to a shade queue or
/// return the slot to the pool, exactly once per exit path.
#[derive(Debug, Clone)]
pub struct RayState {
    pub ray: Ray,
    pub hit: RayHit,
    pub path: PathVertex,
    pub subpixel: Subpixel,
    pub sequence_id: u32,

    // Volume integration results, filled before triage.
    pub vol_hit: bool,
    pub vol_radiance: Vec3,
    pub vol_tr: VolumeTransmittance,
    /// Parametric distance of a volume-terminating surface, if any.
    pub vol_surface_t: f32,

    // Deferred auxiliary payloads, released exactly once.
    pub deep_data: Handle,
    pub cryptomatte_data: Handle,

    // Cryptomatte reference attributes, forwarded verbatim to radiance
    // records.
    pub crypto_ref_p: Vec3,
    pub crypto_ref_n: Vec3,
    pub crypto_uv: Vec2,
    pub tile_pass: u32,
}

impl Default for RayState {
    fn default() -> Self {
        Self {
            ray: Ray::new(Vec3::ZERO, Vec3::Z, 0.0, f32::INFINITY, 0.0, 0),
            hit: RayHit::none(),
            path: PathVertex::default(),
            subpixel: Subpixel::default(),
            sequence_id: 0,
            vol_hit: false,
            vol_radiance: Vec3::ZERO,
            vol_tr: VolumeTransmittance::clear(),
            vol_surface_t: f32::INFINITY,
            deep_data: Handle::NULL,
            cryptomatte_data: Handle::NULL,
            crypto_ref_p: Vec3::ZERO,
            crypto_ref_n: Vec3::ZERO,
            crypto_uv: Vec2::ZERO,
            tile_pass: 0,
        }
    }
}
