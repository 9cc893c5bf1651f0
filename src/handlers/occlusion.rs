//! Occlusion triage engine and presence-shadow triage.
//!
//! An occlusion batch is partitioned into standard entries (which need a
//! visibility test) and forced-unoccluded entries (whose visibility was
//! resolved upstream and must not be tested twice). Each entry produces at
//! most one radiance record, and every deferred payload handle it carries
//! is released exactly once, whichever branch runs.

use glam::Vec3;

use crate::aov::lpe_prefix;
use crate::records::{BundledOcclRay, BundledRadiance, OcclTestType};

use super::{
    accum_light_aovs, accum_visibility_aovs, accum_visibility_aovs_occluded,
    calculate_shadow_falloff, fill_bundled_radiance, get_transmittance, reduce_transparency,
    release_occl_handles, release_unsubmitted_records, FrameState, RayHandlerFlags, RenderTls,
    PRESENCE_EPSILON,
};

/// Stable partition: standard entries to the front, forced-unoccluded
/// entries behind them, relative order preserved within each class.
/// Returns the number of standard entries. Partitioning an
/// already-partitioned batch leaves it unchanged.
pub fn partition_occl_rays(tls: &mut RenderTls, entries: &mut [BundledOcclRay]) -> usize {
    let mut forced: Vec<BundledOcclRay> = tls.scratch.acquire(entries.len());
    let mut write = 0;
    for read in 0..entries.len() {
        match entries[read].occl_test_type {
            OcclTestType::Standard => {
                if write != read {
                    entries.swap(write, read);
                }
                write += 1;
            }
            OcclTestType::ForceNotOccluded => {
                forced.push(entries[read].clone());
            }
        }
    }
    entries[write..].clone_from_slice(&forced);
    tls.scratch.release(forced);
    write
}

/// Visibility-test the standard entries one ray at a time on the CPU
/// accelerator, appending a radiance record per surviving entry.
/// Returns the number of records appended.
fn are_rays_occluded(
    tls: &mut RenderTls,
    fs: &FrameState,
    entries: &mut [BundledOcclRay],
    results: &mut Vec<BundledRadiance>,
) -> usize {
    let disable_shadowing = !fs.settings.enable_shadowing;
    let mut num_filled = 0;

    for occl_ray in entries.iter_mut() {
        assert_eq!(
            occl_ray.occl_test_type,
            OcclTestType::Standard,
            "non-standard entry in the standard partition"
        );

        let is_occluded = fs.accel.occluded(&occl_ray.as_ray());

        if !is_occluded || disable_shadowing {
            // Not occluded; volume transmittance still attenuates the
            // carried radiance.
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

            // Inside the clear-radius falloff band an occluded ray still
            // contributes partial radiance.
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

            // Every declared unoccluded-prefix variant gets an entry per
            // ray, zero-valued when the ray was occluded.
            if fs.aov_schema.has_lpe_prefix_flags(lpe_prefix::UNOCCLUDED) {
                accum_light_aovs(
                    tls,
                    fs,
                    occl_ray,
                    Vec3::ZERO,
                    None,
                    lpe_prefix::UNOCCLUDED,
                );
            }
        }

        release_occl_handles(tls, occl_ray);
    }

    num_filled
}

/// Process forced-unoccluded entries: no visibility test, one record per
/// entry. Returns the number of records appended (always the entry count).
fn force_rays_unoccluded(
    tls: &mut RenderTls,
    fs: &FrameState,
    entries: &mut [BundledOcclRay],
    results: &mut Vec<BundledRadiance>,
) -> usize {
    for occl_ray in entries.iter_mut() {
        assert_eq!(
            occl_ray.occl_test_type,
            OcclTestType::ForceNotOccluded,
            "standard entry in the forced partition"
        );

        let tr = get_transmittance(fs, occl_ray);
        occl_ray.radiance *= tr;
        results.push(fill_bundled_radiance(tls, occl_ray));

        if !occl_ray.data.is_null() {
            accum_light_aovs(tls, fs, occl_ray, occl_ray.radiance, None, lpe_prefix::NONE);
        }

        release_occl_handles(tls, occl_ray);
    }

    entries.len()
}

/// Occlusion triage over one batch: partition, test, emit. Returns the
/// number of radiance records appended to `results` (at most one per
/// entry).
pub fn compute_occlusion_queries(
    tls: &mut RenderTls,
    fs: &FrameState,
    entries: &mut [BundledOcclRay],
    results: &mut Vec<BundledRadiance>,
) -> usize {
    fs.stats.add_occlusion_rays(entries.len() as u64);

    let num_standard = partition_occl_rays(tls, entries);
    let (standard, forced) = entries.split_at_mut(num_standard);

    let mut total = are_rays_occluded(tls, fs, standard, results);
    total += force_rays_unoccluded(tls, fs, forced, results);
    total
}

/// Presence-shadow triage: continuous partial occlusion instead of a
/// binary visibility test. Every entry carries a data list (presence
/// always needs the light reference) and emits exactly one record.
pub fn compute_presence_queries(
    tls: &mut RenderTls,
    fs: &FrameState,
    entries: &mut [BundledOcclRay],
    results: &mut Vec<BundledRadiance>,
) -> usize {
    if entries.is_empty() {
        return 0;
    }
    fs.stats.add_presence_rays(entries.len() as u64);

    let disable_shadowing = !fs.settings.enable_shadowing;
    let mut num_filled = 0;

    for occl_ray in entries.iter_mut() {
        assert!(
            !occl_ray.data.is_null(),
            "presence entry without a data list"
        );
        let light_idx = tls.occl_data.get(occl_ray.data)[0].light;
        let ray_epsilon = tls.occl_data.get(occl_ray.data)[0].ray_epsilon;
        let light = fs.lights.light(light_idx);

        let presence = light.presence(
            &occl_ray.as_ray(),
            ray_epsilon,
            fs.settings.max_presence_depth,
        );

        let tr = get_transmittance(fs, occl_ray);
        occl_ray.radiance *= tr;

        let mut result = fill_bundled_radiance(tls, occl_ray);
        if presence > PRESENCE_EPSILON && !disable_shadowing {
            // Light partially blocked; scale RGB, leave alpha alone.
            result.radiance[0] *= 1.0 - presence;
            result.radiance[1] *= 1.0 - presence;
            result.radiance[2] *= 1.0 - presence;
        }
        results.push(result);
        num_filled += 1;

        // Unoccluded-prefix variants track the occlusion factor
        // separately so they can ignore presence.
        let occlusion_value = (1.0 - presence) * tr;
        accum_light_aovs(
            tls,
            fs,
            occl_ray,
            occl_ray.radiance,
            Some(occlusion_value),
            lpe_prefix::UNOCCLUDED,
        );
        accum_visibility_aovs(tls, fs, occl_ray, reduce_transparency(occlusion_value));

        // Presence mode carries no deep data; the data list and
        // cryptomatte handle are ours to release.
        tls.occl_data.release(occl_ray.data);
        tls.cryptomatte_data.release(occl_ray.cryptomatte_data);
    }

    num_filled
}

/// Batch entry point for CPU occlusion queries: triage, then deliver the
/// surviving records to the radiance sink.
pub fn process_occlusion_batch(
    tls: &mut RenderTls,
    fs: &FrameState,
    entries: &mut [BundledOcclRay],
    _flags: RayHandlerFlags,
) {
    let mark = tls.scratch.mark();
    let mut results: Vec<BundledRadiance> = tls.scratch.acquire(entries.len());

    let num_filled = compute_occlusion_queries(tls, fs, entries, &mut results);
    assert!(num_filled <= entries.len());
    assert_eq!(num_filled, results.len());

    if fs.cancel.is_cancelled() {
        log::debug!("occlusion batch cancelled before delivery");
        release_unsubmitted_records(tls, &results);
    } else {
        fs.radiance_queue.push(&results);
        fs.stats.add_radiance_records(results.len() as u64);
    }

    tls.scratch.release(results);
    tls.scratch.check_restored(mark);
}

/// Batch entry point for presence-shadow queries.
pub fn process_presence_batch(
    tls: &mut RenderTls,
    fs: &FrameState,
    entries: &mut [BundledOcclRay],
    _flags: RayHandlerFlags,
) {
    let mark = tls.scratch.mark();
    let mut results: Vec<BundledRadiance> = tls.scratch.acquire(entries.len());

    let num_filled = compute_presence_queries(tls, fs, entries, &mut results);
    assert!(num_filled <= entries.len());

    if fs.cancel.is_cancelled() {
        log::debug!("presence batch cancelled before delivery");
        release_unsubmitted_records(tls, &results);
    } else {
        fs.radiance_queue.push(&results);
        fs.stats.add_radiance_records(results.len() as u64);
    }

    tls.scratch.release(results);
    tls.scratch.check_restored(mark);
}
