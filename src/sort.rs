//! Key sort for triage entries.
//!
//! Batches below the cutover use an unstable comparison sort; larger
//! batches use a counting sort over the `u32` key range. Both paths
//! produce the same per-key grouping; within-key order is unspecified but
//! fixed for a single invocation.

use crate::scratch::ScratchArena;

/// Below this entry count a comparison sort beats setting up count
/// buckets.
pub const STD_SORT_CUTOFF: usize = 200;

/// Counting sort is skipped when the key range dwarfs the batch.
const MAX_COUNTING_KEY: u32 = 1 << 20;

/// Sort `entries` ascending by `key`. `max_key` must be an upper bound on
/// every key in the slice.
pub fn smart_sort32<T, F>(entries: &mut [T], key: F, max_key: u32, scratch: &mut ScratchArena)
where
    T: Copy + Send + 'static,
    F: Fn(&T) -> u32,
{
    if entries.len() < STD_SORT_CUTOFF || max_key > MAX_COUNTING_KEY {
        entries.sort_unstable_by_key(|e| key(e));
        return;
    }

    let num_buckets = max_key as usize + 1;
    let mut counts: Vec<u32> = scratch.acquire(num_buckets);
    counts.resize(num_buckets, 0);
    for e in entries.iter() {
        let k = key(e) as usize;
        debug_assert!(k < num_buckets, "sort key exceeds declared max");
        counts[k] += 1;
    }

    // Exclusive prefix sum: counts[k] becomes the first output slot for
    // key k.
    let mut running = 0u32;
    for c in counts.iter_mut() {
        let n = *c;
        *c = running;
        running += n;
    }

    let mut output: Vec<T> = scratch.acquire(entries.len());
    output.extend_from_slice(entries);
    for e in output.iter() {
        let k = key(e) as usize;
        entries[counts[k] as usize] = *e;
        counts[k] += 1;
    }

    scratch.release(output);
    scratch.release(counts);
}
