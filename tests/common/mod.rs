//! Shared mock collaborators for the handler integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use glam::{Vec2, Vec3};

use raybundle::accel::{CpuAccelerator, GpuOcclusionAccelerator, GpuRay};
use raybundle::aov::{AovQueue, AovSchema, LightAovs};
use raybundle::cancel::CancelToken;
use raybundle::handles::{Handle, OcclData};
use raybundle::light::{Light, LightIntersection, LightScene};
use raybundle::material::{MaterialResolver, ShadeQueue, ShadingMaterial, SortedRayEntry};
use raybundle::pool::RayStatePool;
use raybundle::ray::{Ray, RayHit, RayType};
use raybundle::records::{BundledOcclRay, BundledRadiance, OcclTestType, RadianceSink};
use raybundle::sampler::SequenceSampler;
use raybundle::settings::FrameSettings;
use raybundle::stats::RayStats;
use raybundle::volume::{VolumeIntegrator, VolumeSample};
use raybundle::{FrameState, RenderTls};

/// Scriptable accelerator that counts occlusion queries.
pub struct HookAccel {
    pub intersect_fn: Box<dyn Fn(&Ray) -> Option<RayHit> + Send + Sync>,
    pub occluded_fn: Box<dyn Fn(&Ray) -> bool + Send + Sync>,
    pub occluded_calls: AtomicUsize,
}

impl HookAccel {
    /// Empty scene: nothing hits, nothing occludes.
    pub fn open() -> Self {
        Self {
            intersect_fn: Box::new(|_| None),
            occluded_fn: Box::new(|_| false),
            occluded_calls: AtomicUsize::new(0),
        }
    }

    /// Fully blocked scene: every shadow ray is occluded, nothing hits.
    pub fn closed() -> Self {
        Self {
            intersect_fn: Box::new(|_| None),
            occluded_fn: Box::new(|_| true),
            occluded_calls: AtomicUsize::new(0),
        }
    }

    pub fn occluded_call_count(&self) -> usize {
        self.occluded_calls.load(Ordering::Relaxed)
    }
}

impl CpuAccelerator for HookAccel {
    fn intersect(&self, ray: &Ray) -> Option<RayHit> {
        (self.intersect_fn)(ray)
    }

    fn occluded(&self, ray: &Ray) -> bool {
        self.occluded_calls.fetch_add(1, Ordering::Relaxed);
        (self.occluded_fn)(ray)
    }
}

/// GPU accelerator mock: scripted per-ray answers plus dispatch counting.
pub struct CountingGpu {
    pub occluded_fn: Box<dyn Fn(&[GpuRay], &mut [u8]) + Send + Sync>,
    pub dispatches: AtomicUsize,
}

impl CountingGpu {
    pub fn new(per_ray: impl Fn(&GpuRay) -> bool + Send + Sync + 'static) -> Self {
        Self {
            occluded_fn: Box::new(move |rays, out| {
                for (ray, flag) in rays.iter().zip(out.iter_mut()) {
                    *flag = per_ray(ray) as u8;
                }
            }),
            dispatches: AtomicUsize::new(0),
        }
    }
}

impl GpuOcclusionAccelerator for CountingGpu {
    fn occluded_batch(&self, rays: &[GpuRay], occluded_out: &mut [u8]) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
        (self.occluded_fn)(rays, occluded_out);
    }
}

/// Thread-safe recording radiance sink.
#[derive(Default)]
pub struct CollectSink {
    records: Mutex<Vec<BundledRadiance>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<BundledRadiance> {
        self.records.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<BundledRadiance> {
        std::mem::take(&mut *self.records.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl RadianceSink for CollectSink {
    fn push(&self, records: &[BundledRadiance]) {
        self.records.lock().unwrap().extend_from_slice(records);
    }
}

/// Everything the handlers can tell the AOV layer, recorded verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum AovEvent {
    LightAov {
        pixel: u32,
        lpe_state_id: i32,
        lpe_prefix: u32,
        value: Vec3,
        occlusion: Option<Vec3>,
    },
    Visibility {
        pixel: u32,
        hits: f32,
    },
    VisibilityAttempts {
        pixel: u32,
        attempts: u32,
    },
    Background {
        pixel: u32,
        weight: f32,
    },
    VolumeStateVars {
        pixel: u32,
        surface_t: f32,
        weight: f32,
    },
    HeatMap {
        pixel: u32,
        ticks: u64,
    },
}

/// Recording AOV sink. Can optionally trip a cancel token after a fixed
/// number of background accumulations, to exercise mid-batch cancellation.
#[derive(Default)]
pub struct CollectAov {
    events: Mutex<Vec<AovEvent>>,
    pub cancel_after_backgrounds: Option<(usize, Arc<CancelToken>)>,
}

impl CollectAov {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AovEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn light_aov_events(&self) -> Vec<AovEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, AovEvent::LightAov { .. }))
            .collect()
    }

    fn record(&self, event: AovEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl AovQueue for CollectAov {
    fn accum_light_aov(
        &self,
        pixel: u32,
        _deep_data: Handle,
        lpe_state_id: i32,
        lpe_prefix: u32,
        value: Vec3,
        occlusion: Option<Vec3>,
    ) {
        self.record(AovEvent::LightAov {
            pixel,
            lpe_state_id,
            lpe_prefix,
            value,
            occlusion,
        });
    }

    fn accum_visibility(&self, pixel: u32, _deep_data: Handle, hits: f32) {
        self.record(AovEvent::Visibility { pixel, hits });
    }

    fn accum_visibility_attempts(&self, pixel: u32, _deep_data: Handle, attempts: u32) {
        self.record(AovEvent::VisibilityAttempts { pixel, attempts });
    }

    fn accum_background(&self, pixel: u32, _deep_data: Handle, weight: f32) {
        self.record(AovEvent::Background { pixel, weight });
        if let Some((after, token)) = &self.cancel_after_backgrounds {
            let seen = self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e, AovEvent::Background { .. }))
                .count();
            if seen >= *after {
                token.cancel();
            }
        }
    }

    fn accum_volume_state_vars(
        &self,
        pixel: u32,
        _deep_data: Handle,
        surface_t: f32,
        weight: f32,
    ) {
        self.record(AovEvent::VolumeStateVars {
            pixel,
            surface_t,
            weight,
        });
    }

    fn add_heat_map_ticks(&self, pixel: u32, ticks: u64) {
        self.record(AovEvent::HeatMap { pixel, ticks });
    }
}

/// One configurable light.
pub struct ConstLight {
    pub emission: Vec3,
    pub opaque_in_alpha: bool,
    pub clear_radius: f32,
    pub falloff: f32,
    pub presence_value: f32,
}

impl Default for ConstLight {
    fn default() -> Self {
        Self {
            emission: Vec3::new(2.0, 2.0, 2.0),
            opaque_in_alpha: false,
            clear_radius: 0.0,
            falloff: 0.0,
            presence_value: 0.0,
        }
    }
}

impl Light for ConstLight {
    fn eval(&self, _dir: Vec3, _origin: Vec3, _time: f32, _isect: &LightIntersection) -> Vec3 {
        self.emission
    }

    fn intersect(&self, ray: &Ray, _max_distance: f32) -> Option<LightIntersection> {
        Some(LightIntersection {
            distance: 5.0,
            position: ray.origin + ray.dir * 5.0,
            normal: -ray.dir,
        })
    }

    fn is_opaque_in_alpha(&self) -> bool {
        self.opaque_in_alpha
    }

    fn clear_radius(&self) -> f32 {
        self.clear_radius
    }

    fn clear_radius_falloff_distance(&self) -> f32 {
        self.falloff
    }

    fn presence(&self, _ray: &Ray, _ray_epsilon: f32, _max_depth: u32) -> f32 {
        self.presence_value
    }
}

/// Scene with one light; `visible_hits == 0` means miss rays see no light.
pub struct SingleLightScene {
    pub light: ConstLight,
    pub visible_hits: u32,
}

impl Default for SingleLightScene {
    fn default() -> Self {
        Self {
            light: ConstLight::default(),
            visible_hits: 0,
        }
    }
}

impl LightScene for SingleLightScene {
    fn light_count(&self) -> usize {
        1
    }

    fn light(&self, index: usize) -> &dyn Light {
        assert_eq!(index, 0);
        &self.light
    }

    fn intersect_visible_light(
        &self,
        ray: &Ray,
        max_distance: f32,
        sampler: &mut SequenceSampler,
    ) -> Option<(usize, LightIntersection, u32)> {
        let _ = sampler.next_1d();
        if self.visible_hits == 0 {
            return None;
        }
        self.light
            .intersect(ray, max_distance)
            .map(|isect| (0, isect, self.visible_hits))
    }
}

/// Uniform volume response for every ray.
pub struct UniformVolume {
    pub sample: VolumeSample,
    pub shadow_tr: Vec3,
}

impl UniformVolume {
    pub fn none() -> Self {
        Self {
            sample: VolumeSample::none(),
            shadow_tr: Vec3::ONE,
        }
    }
}

impl VolumeIntegrator for UniformVolume {
    fn integrate(&self, _ray: &Ray, _path: &raybundle::ray::PathVertex, _seq: u32) -> VolumeSample {
        self.sample
    }

    fn transmittance(&self, _ray: &Ray) -> Vec3 {
        self.shadow_tr
    }
}

/// Shade queue that records every submitted span.
#[derive(Default)]
pub struct RecordingQueue {
    batches: Mutex<Vec<Vec<SortedRayEntry>>>,
}

impl RecordingQueue {
    pub fn batches(&self) -> Vec<Vec<SortedRayEntry>> {
        self.batches.lock().unwrap().clone()
    }
}

impl ShadeQueue for RecordingQueue {
    fn submit(&self, entries: &[SortedRayEntry]) {
        self.batches.lock().unwrap().push(entries.to_vec());
    }
}

pub struct TestMaterial {
    pub id: u32,
    pub queue: RecordingQueue,
}

impl TestMaterial {
    pub fn new(id: u32) -> Self {
        assert!(id != 0);
        Self {
            id,
            queue: RecordingQueue::default(),
        }
    }
}

impl ShadingMaterial for TestMaterial {
    fn material_id(&self) -> u32 {
        self.id
    }

    fn shade_queue(&self) -> &dyn ShadeQueue {
        &self.queue
    }
}

/// Resolver mapping geometry id `g` (1-based) to `materials[g - 1]`.
/// Out-of-range ids resolve to no material.
#[derive(Default)]
pub struct GeomMaterials {
    pub materials: Vec<TestMaterial>,
}

impl MaterialResolver for GeomMaterials {
    fn resolve(&self, hit: &RayHit, _ray_type: RayType) -> Option<&dyn ShadingMaterial> {
        let g = hit.geom_id as usize;
        if g == 0 || g > self.materials.len() {
            return None;
        }
        Some(&self.materials[g - 1])
    }
}

/// Owns one frame's worth of collaborators; tests mutate fields before
/// borrowing a `FrameState` through [`Frame::state`].
pub struct Frame {
    pub accel: HookAccel,
    pub gpu: Option<CountingGpu>,
    pub lights: SingleLightScene,
    pub volumes: UniformVolume,
    pub materials: GeomMaterials,
    pub aov_schema: AovSchema,
    pub light_aovs: LightAovs,
    pub aov_queue: CollectAov,
    pub sink: CollectSink,
    pub ray_pool: RayStatePool,
    pub cancel: Arc<CancelToken>,
    pub settings: FrameSettings,
    pub stats: RayStats,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            accel: HookAccel::open(),
            gpu: None,
            lights: SingleLightScene::default(),
            volumes: UniformVolume::none(),
            materials: GeomMaterials::default(),
            aov_schema: AovSchema::new(4, raybundle::aov::lpe_prefix::UNOCCLUDED),
            light_aovs: LightAovs::new(),
            aov_queue: CollectAov::new(),
            sink: CollectSink::new(),
            ray_pool: RayStatePool::with_capacity(512).unwrap(),
            cancel: Arc::new(CancelToken::new()),
            settings: FrameSettings::default(),
            stats: RayStats::new(),
        }
    }

    pub fn state(&self) -> FrameState<'_> {
        FrameState {
            accel: &self.accel,
            gpu_accel: self
                .gpu
                .as_ref()
                .map(|g| g as &dyn GpuOcclusionAccelerator),
            lights: &self.lights,
            volumes: &self.volumes,
            materials: &self.materials,
            aov_schema: &self.aov_schema,
            light_aovs: &self.light_aovs,
            aov_queue: &self.aov_queue,
            radiance_queue: &self.sink,
            ray_pool: &self.ray_pool,
            cancel: &self.cancel,
            settings: &self.settings,
            stats: &self.stats,
        }
    }
}

/// Build an occlusion entry with freshly inserted payload handles. An
/// empty `data_items` slice means no data list (NULL handle).
pub fn make_occl_ray(
    tls: &mut RenderTls,
    occl_test_type: OcclTestType,
    pixel: u32,
    radiance: Vec3,
    tfar: f32,
    data_items: &[OcclData],
) -> BundledOcclRay {
    let data = if data_items.is_empty() {
        Handle::NULL
    } else {
        tls.occl_data.insert(data_items.to_vec())
    };
    BundledOcclRay {
        origin: Vec3::ZERO,
        dir: Vec3::Z,
        tnear: 1.0e-4,
        tfar,
        time: 0.0,
        depth: 1,
        radiance,
        occl_test_type,
        shadow_receiver_id: 0,
        pixel,
        subpixel_index: 0,
        sequence_id: 0,
        path_pixel_weight: 1.0,
        data,
        deep_data: tls.deep_data.insert(Default::default()),
        cryptomatte_data: tls.cryptomatte_data.insert(Default::default()),
        crypto_ref_p: Vec3::ZERO,
        crypto_ref_n: Vec3::ZERO,
        crypto_uv: Vec2::ZERO,
        tile_pass: 0,
    }
}

/// Presence entry: always carries a data list, never deep data.
pub fn make_presence_ray(
    tls: &mut RenderTls,
    pixel: u32,
    radiance: Vec3,
    data_items: &[OcclData],
) -> BundledOcclRay {
    assert!(!data_items.is_empty());
    let mut entry = make_occl_ray(
        tls,
        OcclTestType::Standard,
        pixel,
        radiance,
        10.0,
        data_items,
    );
    tls.deep_data.release(entry.deep_data);
    entry.deep_data = Handle::NULL;
    entry
}

/// Single-item data list targeting light 0 under the given LPE state.
pub fn one_light_data(lpe_state_id: i32) -> Vec<OcclData> {
    vec![OcclData {
        light: 0,
        ray_epsilon: 1.0e-4,
        lpe_state_id,
    }]
}

/// Take the sink's records and release the handle references they carry,
/// as the real result-aggregation stage would.
pub fn drain_sink(tls: &mut RenderTls, sink: &CollectSink) -> Vec<BundledRadiance> {
    let records = sink.take();
    for rec in &records {
        tls.deep_data.release(rec.deep_data);
        tls.cryptomatte_data.release(rec.cryptomatte_data);
    }
    records
}

pub fn rgb(rec: &BundledRadiance) -> Vec3 {
    Vec3::new(rec.radiance[0], rec.radiance[1], rec.radiance[2])
}

pub fn approx(a: Vec3, b: Vec3) -> bool {
    (a - b).abs().max_element() < 1.0e-5
}
