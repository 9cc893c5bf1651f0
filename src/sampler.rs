//! Deterministic per-sample random streams.
//!
//! Light selection for miss rays must be reproducible across runs and
//! independent of batch composition, so each stream is keyed by
//! (pixel, subpixel, seed) and advances a private counter.

/// Hash-counter sample stream for one (pixel, subpixel) sample.
#[derive(Debug, Clone)]
pub struct SequenceSampler {
    state: u32,
    counter: u32,
}

impl SequenceSampler {
    pub fn new(pixel: u32, subpixel_index: u32, seed: u32) -> Self {
        let mut state = pixel;
        state = mix(state ^ subpixel_index.wrapping_mul(0x9e3779b9));
        state = mix(state ^ seed.wrapping_mul(0x85ebca6b));
        Self { state, counter: 0 }
    }

    /// Next sample in [0, 1).
    pub fn next_1d(&mut self) -> f32 {
        let h = mix(self.state ^ self.counter.wrapping_mul(0xc2b2ae35));
        self.counter = self.counter.wrapping_add(1);
        // 24 mantissa bits, guarantees < 1.0.
        (h >> 8) as f32 * (1.0 / 16_777_216.0)
    }
}

fn mix(mut x: u32) -> u32 {
    // PCG-style output permutation.
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846ca68b);
    x ^= x >> 16;
    x
}
