//! GPU occlusion adapter.
//!
//! Marshals a CPU-side occlusion batch into the flat ray layout the GPU
//! accelerator consumes, dispatches one batched visibility query, then
//! reconciles the per-ray answers through the same triage branches as the
//! CPU path. Forced-unoccluded entries ride along in the upload but their
//! GPU answer is ignored.

use std::sync::atomic::{AtomicI32, Ordering};

use glam::Vec3;

use crate::accel::{GpuOcclusionAccelerator, GpuRay};
use crate::aov::lpe_prefix;
use crate::records::{BundledOcclRay, BundledRadiance, OcclTestType};

use super::{
    accum_light_aovs, accum_visibility_aovs, accum_visibility_aovs_occluded,
    calculate_shadow_falloff, fill_bundled_radiance, get_transmittance, reduce_transparency,
    release_occl_handles, release_unsubmitted_records, FrameState, RayHandlerFlags, RenderTls,
};

/// Run one occlusion batch through the GPU accelerator and reconcile the
/// results. Appends at most one radiance record per entry and returns the
/// number appended. `threads_using_gpu` tracks concurrent GPU users for
/// the scheduler's routing heuristic.
pub fn compute_gpu_occlusion_queries(
    tls: &mut RenderTls,
    fs: &FrameState,
    entries: &mut [BundledOcclRay],
    gpu_accel: &dyn GpuOcclusionAccelerator,
    threads_using_gpu: &AtomicI32,
    results: &mut Vec<BundledRadiance>,
) -> usize {
    fs.stats.add_occlusion_rays(entries.len() as u64);
    fs.stats.add_gpu_occlusion_rays(entries.len() as u64);

    let mark = tls.scratch.mark();
    let mut gpu_rays: Vec<GpuRay> = tls.scratch.acquire(entries.len());
    for occl_ray in entries.iter() {
        gpu_rays.push(GpuRay {
            origin: occl_ray.origin.to_array(),
            tnear: occl_ray.tnear,
            dir: occl_ray.dir.to_array(),
            tfar: occl_ray.tfar,
            time: occl_ray.time,
            shadow_receiver_id: occl_ray.shadow_receiver_id,
            _pad: [0; 2],
        });
    }

    let mut occluded: Vec<u8> = tls.scratch.acquire(entries.len());
    occluded.resize(entries.len(), 0);

    threads_using_gpu.fetch_add(1, Ordering::Relaxed);
    gpu_accel.occluded_batch(&gpu_rays, &mut occluded);
    threads_using_gpu.fetch_sub(1, Ordering::Relaxed);

    let disable_shadowing = !fs.settings.enable_shadowing;
    let mut num_filled = 0;

    for (i, occl_ray) in entries.iter_mut().enumerate() {
        if occl_ray.occl_test_type == OcclTestType::ForceNotOccluded {
            let tr = get_transmittance(fs, occl_ray);
            occl_ray.radiance *= tr;
            results.push(fill_bundled_radiance(tls, occl_ray));
            num_filled += 1;

            if !occl_ray.data.is_null() {
                accum_light_aovs(tls, fs, occl_ray, occl_ray.radiance, None, lpe_prefix::NONE);
            }
        } else if occluded[i] == 0 || disable_shadowing {
            let tr = get_transmittance(fs, occl_ray);
            occl_ray.radiance *= tr;
            results.push(fill_bundled_radiance(tls, occl_ray));
            num_filled += 1;

            if !occl_ray.data.is_null() {
                accum_light_aovs(
                    tls,
                    fs,
                    occl_ray,
                    occl_ray.radiance,
                    Some(tr),
                    lpe_prefix::UNOCCLUDED,
                );
                accum_visibility_aovs(tls, fs, occl_ray, reduce_transparency(tr));
            }
        } else if !occl_ray.data.is_null() {
            let light_idx = tls.occl_data.get(occl_ray.data)[0].light;
            let light = fs.lights.light(light_idx);

            if light.clear_radius_falloff_distance() != 0.0
                && occl_ray.tfar < light.clear_radius() + light.clear_radius_falloff_distance()
            {
                let tr = get_transmittance(fs, occl_ray);
                occl_ray.radiance =
                    calculate_shadow_falloff(light, occl_ray.tfar, tr * occl_ray.radiance);
                results.push(fill_bundled_radiance(tls, occl_ray));
                num_filled += 1;
            }

            accum_visibility_aovs_occluded(tls, fs, occl_ray);

            if fs.aov_schema.has_lpe_prefix_flags(lpe_prefix::UNOCCLUDED) {
                accum_light_aovs(tls, fs, occl_ray, Vec3::ZERO, None, lpe_prefix::UNOCCLUDED);
            }
        }

        release_occl_handles(tls, occl_ray);
    }

    tls.scratch.release(occluded);
    tls.scratch.release(gpu_rays);
    tls.scratch.check_restored(mark);

    num_filled
}

/// Batch entry point for GPU occlusion queries. Requires a GPU
/// accelerator on the frame state; the scheduler must not route batches
/// here without one.
pub fn process_gpu_occlusion_batch(
    tls: &mut RenderTls,
    fs: &FrameState,
    entries: &mut [BundledOcclRay],
    threads_using_gpu: &AtomicI32,
    _flags: RayHandlerFlags,
) {
    let gpu_accel = fs
        .gpu_accel
        .expect("GPU occlusion batch routed without a GPU accelerator");

    let mark = tls.scratch.mark();
    let mut results: Vec<BundledRadiance> = tls.scratch.acquire(entries.len());

    let num_filled =
        compute_gpu_occlusion_queries(tls, fs, entries, gpu_accel, threads_using_gpu, &mut results);
    assert!(num_filled <= entries.len());
    assert_eq!(num_filled, results.len());

    if fs.cancel.is_cancelled() {
        log::debug!("gpu occlusion batch cancelled before delivery");
        release_unsubmitted_records(tls, &results);
    } else {
        fs.radiance_queue.push(&results);
        fs.stats.add_radiance_records(results.len() as u64);
    }

    tls.scratch.release(results);
    tls.scratch.check_restored(mark);
}
