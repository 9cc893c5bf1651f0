//! Light-system capability traits consumed by the triage engines.

use glam::Vec3;

use crate::ray::Ray;
use crate::sampler::SequenceSampler;

/// Hit information for a ray/light intersection.
#[derive(Debug, Clone, Copy)]
pub struct LightIntersection {
    pub distance: f32,
    /// Point on the light, used by `Light::eval`.
    pub position: Vec3,
    pub normal: Vec3,
}

/// One light in the scene, as seen by the ray-execution core.
pub trait Light: Send + Sync {
    /// Emitted radiance toward `origin` along `dir` for a confirmed
    /// intersection.
    fn eval(&self, dir: Vec3, origin: Vec3, time: f32, isect: &LightIntersection) -> Vec3;

    /// Ray/light intersection within `max_distance`.
    fn intersect(&self, ray: &Ray, max_distance: f32) -> Option<LightIntersection>;

    /// Whether a direct hit contributes full pixel weight to alpha.
    fn is_opaque_in_alpha(&self) -> bool;

    /// Radius around the light inside which shadows are suppressed.
    fn clear_radius(&self) -> f32 {
        0.0
    }

    /// Width of the ramp from unshadowed (at the clear radius) to fully
    /// shadowed. Zero disables clear-radius falloff.
    fn clear_radius_falloff_distance(&self) -> f32 {
        0.0
    }

    /// Accumulated presence (partial occlusion) in [0, 1] along a shadow
    /// ray toward this light.
    fn presence(&self, ray: &Ray, ray_epsilon: f32, max_depth: u32) -> f32;
}

/// The scene's light set plus stochastic visible-light selection.
pub trait LightScene: Send + Sync {
    fn light_count(&self) -> usize;

    fn light(&self, index: usize) -> &dyn Light;

    /// Stochastically pick one light the ray hits, if any. Returns the
    /// light index, the intersection, and the number of lights an
    /// equivalent ray would have hit (the one-sample estimator
    /// correction factor).
    fn intersect_visible_light(
        &self,
        ray: &Ray,
        max_distance: f32,
        sampler: &mut SequenceSampler,
    ) -> Option<(usize, LightIntersection, u32)>;
}
