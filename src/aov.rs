//! AOV schema, light-path-expression bookkeeping, and the accumulation
//! sink consumed by the ray handlers.
//!
//! The handlers never compute AOV math themselves; they decide *which*
//! accumulate call fires, with what pixel/weight/value, and the sink owns
//! the rest. The schema is the frame-constant description of which
//! channels and LPE prefix variants exist.

use glam::Vec3;

use crate::handles::Handle;

/// LPE prefix variant flags declared by the schema.
pub mod lpe_prefix {
    pub const NONE: u32 = 0;
    /// "Unoccluded" prefix: light AOVs that ignore occlusion.
    pub const UNOCCLUDED: u32 = 1 << 0;
}

/// Frame-constant AOV channel description.
#[derive(Debug, Clone, Default)]
pub struct AovSchema {
    num_channels: u32,
    lpe_prefix_flags: u32,
}

impl AovSchema {
    pub fn new(num_channels: u32, lpe_prefix_flags: u32) -> Self {
        Self {
            num_channels,
            lpe_prefix_flags,
        }
    }

    /// Schema with no channels: every accumulate call is skipped upstream.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.num_channels == 0
    }

    pub fn num_channels(&self) -> u32 {
        self.num_channels
    }

    pub fn has_lpe_prefix_flags(&self, flags: u32) -> bool {
        self.lpe_prefix_flags & flags == flags && flags != lpe_prefix::NONE
    }
}

/// Light-path-expression automaton, reduced to the transitions the ray
/// handlers need: "from scattering state S, hitting light L moves to
/// state T".
#[derive(Debug, Clone, Default)]
pub struct LightAovs {
    transitions: std::collections::HashMap<(i32, usize), i32>,
}

impl LightAovs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_light_transition(&mut self, from_state: i32, light: usize, to_state: i32) {
        self.transitions.insert((from_state, light), to_state);
    }

    /// State after a light event, or -1 when no LPE matches.
    pub fn light_event_transition(&self, state_id: i32, light: usize) -> i32 {
        if state_id < 0 {
            return -1;
        }
        self.transitions
            .get(&(state_id, light))
            .copied()
            .unwrap_or(-1)
    }
}

/// Thread-safe accumulation sink for all auxiliary per-pixel channels.
///
/// Every method is keyed by pixel; weights and values arrive fully
/// computed. Implementations own synchronization and the channel math.
pub trait AovQueue: Send + Sync {
    /// Accumulate a light AOV under `lpe_state_id`. `occlusion` carries the
    /// occlusion factor separately when the prefix is
    /// [`lpe_prefix::UNOCCLUDED`], so unoccluded variants can ignore it.
    fn accum_light_aov(
        &self,
        pixel: u32,
        deep_data: Handle,
        lpe_state_id: i32,
        lpe_prefix: u32,
        value: Vec3,
        occlusion: Option<Vec3>,
    );

    /// Accumulate a visibility AOV sample: `hits` out of one attempt.
    fn accum_visibility(&self, pixel: u32, deep_data: Handle, hits: f32);

    /// Accumulate `attempts` visibility attempts with zero hits.
    fn accum_visibility_attempts(&self, pixel: u32, deep_data: Handle, attempts: u32);

    /// Background/extra AOVs for a ray that escaped the scene.
    fn accum_background(&self, pixel: u32, deep_data: Handle, weight: f32);

    /// Volume-only state variables (depth/position) for a primary ray that
    /// terminated inside a volume.
    fn accum_volume_state_vars(&self, pixel: u32, deep_data: Handle, surface_t: f32, weight: f32);

    /// Heat-map timing, in clock ticks attributed to `pixel`.
    fn add_heat_map_ticks(&self, pixel: u32, ticks: u64);
}
