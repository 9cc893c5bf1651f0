//! Volume-integration capability trait.
//!
//! Volume radiance and transmittance are computed by the (external) path
//! integrator; the core only stores the results on the ray state and folds
//! them into radiance records at the right points.

use glam::Vec3;

use crate::ray::{PathVertex, Ray, VolumeTransmittance};

/// Result of integrating volumes along one ray.
#[derive(Debug, Clone, Copy)]
pub struct VolumeSample {
    /// Whether the ray passed through any volume.
    pub hit: bool,
    /// In-scattered volume radiance along the ray.
    pub radiance: Vec3,
    pub transmittance: VolumeTransmittance,
    /// Parametric distance of a volume-terminating surface, infinite when
    /// none exists.
    pub surface_t: f32,
}

impl VolumeSample {
    /// Sample for a ray that touched no volume.
    pub fn none() -> Self {
        Self {
            hit: false,
            radiance: Vec3::ZERO,
            transmittance: VolumeTransmittance::clear(),
            surface_t: f32::INFINITY,
        }
    }
}

pub trait VolumeIntegrator: Send + Sync {
    /// Full volume integration for an intersection-batch ray; runs once
    /// per ray before triage.
    fn integrate(&self, ray: &Ray, path: &PathVertex, sequence_id: u32) -> VolumeSample;

    /// Transmittance along a shadow ray (occlusion batches only need the
    /// combined attenuation, not radiance).
    fn transmittance(&self, ray: &Ray) -> Vec3;
}
