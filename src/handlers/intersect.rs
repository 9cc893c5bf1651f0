//! Intersection and triage dispatcher.
//!
//! One batch pass: intersect every ray, fold in volume radiance and
//! transmittance, classify each ray (miss / hit with material / hit with
//! nothing shadeable), sort survivors by material for cache-coherent
//! dispatch, resolve miss rays against visible lights, and hand material
//! spans to their shade queues. Ray-state ownership leaves this function
//! either via a shade-queue submission or via a bulk return to the pool.

use std::time::Instant;

use glam::Vec3;

use crate::aov::lpe_prefix;
use crate::ray::{RayHit, INFINITE_LIGHT_DISTANCE};
use crate::records::{BundledRadiance, SortedEntry};
use crate::sampler::SequenceSampler;
use crate::sort::smart_sort32;

use super::{
    heat_map_bundled_update, reduce_transparency, FrameState, RayHandlerFlags, RenderTls,
};

/// Build one radiance record from a ray state, acquiring references on its
/// deferred payloads for the sink.
fn fill_radiance_from_state(
    tls: &mut RenderTls,
    rs: &crate::ray::RayState,
    radiance: Vec3,
    alpha: f32,
) -> BundledRadiance {
    BundledRadiance {
        radiance: [radiance.x, radiance.y, radiance.z, alpha],
        path_pixel_weight: rs.path.path_pixel_weight,
        pixel: rs.subpixel.pixel,
        subpixel_index: rs.subpixel.subpixel_index,
        deep_data: tls.deep_data.acquire(rs.deep_data),
        cryptomatte_data: tls.cryptomatte_data.acquire(rs.cryptomatte_data),
        crypto_ref_p: rs.crypto_ref_p,
        crypto_ref_n: rs.crypto_ref_n,
        crypto_uv: rs.crypto_uv,
        tile_pass: rs.tile_pass,
    }
}

/// Release the deferred payloads still owned by a ray state. Runs once
/// per terminated ray, right before its slot returns to the pool.
fn release_state_handles(tls: &mut RenderTls, rs: &crate::ray::RayState) {
    tls.deep_data.release(rs.deep_data);
    tls.cryptomatte_data.release(rs.cryptomatte_data);
}

/// Process a batch of in-flight rays identified by pool index.
///
/// On cancellation this returns early with a partial-success contract:
/// entries fully processed keep their contributions, entries not yet
/// reached stay live in the pool for a later cleanup pass.
pub fn process_intersection_batch(
    tls: &mut RenderTls,
    fs: &FrameState,
    ray_indices: &[u32],
    _flags: RayHandlerFlags,
) {
    if ray_indices.is_empty() {
        return;
    }

    let phase_start = fs.settings.requires_heat_map.then(Instant::now);

    // Intersection, then volumes, for every ray. Volumes must run before
    // triage: a miss or a material-less hit may still carry volume
    // radiance that has to be flushed.
    fs.stats.add_intersection_rays(ray_indices.len() as u64);
    for &idx in ray_indices {
        // Safety: this thread owns the whole batch of indices.
        let rs = unsafe { fs.ray_pool.state_mut(idx) };
        rs.hit = fs.accel.intersect(&rs.ray).unwrap_or_else(RayHit::none);

        let vs = fs.volumes.integrate(&rs.ray, &rs.path, rs.sequence_id);
        rs.vol_hit = vs.hit;
        rs.vol_radiance = vs.radiance;
        rs.vol_tr = vs.transmittance;
        rs.vol_surface_t = vs.surface_t;
    }

    if fs.cancel.is_cancelled() {
        log::debug!("intersection batch cancelled after intersect/volume phase");
        return;
    }

    if let Some(start) = phase_start {
        let ticks = start.elapsed().as_nanos() as u64;
        let pixels = ray_indices
            .iter()
            .map(|&idx| unsafe { fs.ray_pool.state_mut(idx) }.subpixel.pixel);
        heat_map_bundled_update(fs, ticks, pixels, ray_indices.len());
    }

    let batch_mark = tls.scratch.mark();
    let mut sorted: Vec<SortedEntry> = tls.scratch.acquire(ray_indices.len());
    let mut to_free: Vec<u32> = tls.scratch.acquire(ray_indices.len());
    let mut max_sort_key = 0u32;

    for &idx in ray_indices {
        let rs = unsafe { fs.ray_pool.state_mut(idx) };

        if !rs.hit.is_hit() {
            sorted.push(SortedEntry {
                sort_key: 0,
                rs_idx: idx,
            });

            // Primary rays that miss everything still count as visibility
            // attempts, to keep geometry edges from aliasing in the
            // visibility AOV.
            if rs.ray.is_primary() && !fs.aov_schema.is_empty() {
                let attempts =
                    fs.settings.light_sample_count * fs.lights.light_count() as u32;
                fs.aov_queue
                    .accum_visibility_attempts(rs.subpixel.pixel, rs.deep_data, attempts);
            }
            continue;
        }

        match fs
            .materials
            .resolve(&rs.hit, rs.path.lobe_type.ray_type())
        {
            Some(material) => {
                let sort_key = material.material_id();
                assert!(sort_key != 0, "material id 0 is reserved for misses");
                max_sort_key = max_sort_key.max(sort_key);
                sorted.push(SortedEntry {
                    sort_key,
                    rs_idx: idx,
                });
            }
            None => {
                // Nothing shadeable at the hit point; the ray terminates
                // here, but volume radiance it picked up still has to
                // reach the sink.
                if rs.vol_hit {
                    let alpha = if rs.ray.is_primary() {
                        rs.path.path_pixel_weight
                            * (1.0 - reduce_transparency(rs.vol_tr.alpha))
                    } else {
                        0.0
                    };
                    let vol_radiance = rs.vol_radiance;
                    let rec = fill_radiance_from_state(tls, rs, vol_radiance, alpha);
                    fs.radiance_queue.push(std::slice::from_ref(&rec));
                    fs.stats.add_radiance_records(1);
                }
                release_state_handles(tls, rs);
                to_free.push(idx);
            }
        }
    }

    smart_sort32(&mut sorted, |e| e.sort_key, max_sort_key, &mut tls.scratch);

    // Leading key-0 span: rays that hit nothing. Primary rays may still
    // see a light directly; all of them may carry volume radiance.
    let num_misses = sorted.iter().take_while(|e| e.sort_key == 0).count();
    let mut cancelled = false;

    if num_misses > 0 {
        let mut radiances: Vec<BundledRadiance> = tls.scratch.acquire(num_misses);

        for entry in &sorted[..num_misses] {
            if fs.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let idx = entry.rs_idx;
            let rs = unsafe { fs.ray_pool.state_mut(idx) };

            let mut radiance = Vec3::ZERO;
            let mut alpha = 0.0f32;
            let mut hit_light = None;

            if rs.ray.is_primary() {
                let mut sampler = SequenceSampler::new(
                    rs.subpixel.pixel,
                    rs.subpixel.subpixel_index,
                    fs.settings.initial_seed,
                );
                if let Some((light_idx, isect, num_hits)) = fs.lights.intersect_visible_light(
                    &rs.ray,
                    INFINITE_LIGHT_DISTANCE,
                    &mut sampler,
                ) {
                    let light = fs.lights.light(light_idx);
                    // One stochastically chosen light stands in for every
                    // light this ray would have hit, hence the hit-count
                    // scale.
                    radiance = rs.path.path_throughput
                        * light.eval(rs.ray.dir, rs.ray.origin, rs.ray.time, &isect)
                        * num_hits as f32;
                    if rs.vol_hit {
                        radiance *= rs.vol_tr.combined();
                    }

                    alpha = if light.is_opaque_in_alpha() {
                        // Opaque in alpha: full pixel weight, volumes
                        // irrelevant.
                        rs.path.path_pixel_weight
                    } else if rs.vol_hit {
                        rs.path.path_pixel_weight
                            * (1.0 - reduce_transparency(rs.vol_tr.alpha))
                    } else {
                        0.0
                    };
                    hit_light = Some(light_idx);
                } else if rs.vol_hit {
                    alpha = rs.path.path_pixel_weight
                        * (1.0 - reduce_transparency(rs.vol_tr.alpha));
                }
            }

            // Volume radiance contributes whether or not a light was hit.
            radiance += rs.vol_radiance;

            let rec = fill_radiance_from_state(tls, rs, radiance, alpha);

            if !fs.aov_schema.is_empty() {
                fs.aov_queue.accum_background(
                    rec.pixel,
                    rec.deep_data,
                    rs.path.path_pixel_weight,
                );

                if rs.ray.is_primary() && rs.vol_hit && rs.vol_surface_t.is_finite() {
                    fs.aov_queue.accum_volume_state_vars(
                        rec.pixel,
                        rec.deep_data,
                        rs.vol_surface_t,
                        rs.path.path_pixel_weight,
                    );
                }

                // Camera rays transition their own LPE state through the
                // light event; deeper rays use the light state the
                // integrator precomputed when it spawned them.
                let lpe_state_id = if rs.ray.is_primary() {
                    match hit_light {
                        Some(light_idx) => fs
                            .light_aovs
                            .light_event_transition(rs.path.lpe_state_id, light_idx),
                        None => -1,
                    }
                } else {
                    rs.path.lpe_state_id_light
                };
                if lpe_state_id >= 0 {
                    fs.aov_queue.accum_light_aov(
                        rec.pixel,
                        rec.deep_data,
                        lpe_state_id,
                        lpe_prefix::NONE,
                        radiance,
                        None,
                    );
                }
            }

            radiances.push(rec);
            release_state_handles(tls, rs);
            to_free.push(idx);
        }

        // Deliver whatever completed; on cancellation that is the prefix
        // processed so far.
        fs.radiance_queue.push(&radiances);
        fs.stats.add_radiance_records(radiances.len() as u64);
        tls.scratch.release(radiances);
    }

    // Bulk-return every terminated ray state.
    assert!(to_free.len() <= ray_indices.len());
    fs.ray_pool.free_bulk(&to_free);
    tls.scratch.release(to_free);

    if cancelled {
        log::debug!("intersection batch cancelled during miss evaluation");
        tls.scratch.release(sorted);
        tls.scratch.check_restored(batch_mark);
        return;
    }

    // Route the remaining entries to their materials in contiguous spans.
    // Shade queues are internally synchronized; submissions transfer
    // ray-state ownership to the queue.
    let mut span_start = num_misses;
    while span_start < sorted.len() {
        let key = sorted[span_start].sort_key;
        let mut span_end = span_start + 1;
        while span_end < sorted.len() && sorted[span_end].sort_key == key {
            span_end += 1;
        }

        let span_mark = tls.scratch.mark();
        let mut shade_entries: Vec<crate::material::SortedRayEntry> =
            tls.scratch.acquire(span_end - span_start);
        for entry in &sorted[span_start..span_end] {
            let rs = unsafe { fs.ray_pool.state_mut(entry.rs_idx) };
            shade_entries.push(crate::material::SortedRayEntry {
                sort_key: crate::material::SortedRayEntry::locality_key(&rs.hit),
                rs_idx: entry.rs_idx,
            });
        }

        let leader = unsafe { fs.ray_pool.state_mut(sorted[span_start].rs_idx) };
        let material = fs
            .materials
            .resolve(&leader.hit, leader.path.lobe_type.ray_type())
            .expect("material resolved during triage vanished before dispatch");
        debug_assert_eq!(material.material_id(), key);
        material.shade_queue().submit(&shade_entries);

        tls.scratch.release(shade_entries);
        tls.scratch.check_restored(span_mark);

        if fs.cancel.is_cancelled() {
            log::debug!("intersection batch cancelled between shade spans");
            break;
        }
        span_start = span_end;
    }

    tls.scratch.release(sorted);
    tls.scratch.check_restored(batch_mark);
}
