//! Per-frame integrator settings consumed by the ray handlers.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Frame-constant knobs for the triage/dispatch handlers.
///
/// Built once per frame by the external scheduler and shared read-only with
/// every render thread via [`crate::handlers::FrameState`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrameSettings {
    /// When false, occlusion results are ignored and every shadow ray
    /// contributes as if unoccluded.
    pub enable_shadowing: bool,
    /// Maximum traversal depth for presence (partial occlusion) walks.
    pub max_presence_depth: u32,
    /// Light samples taken per hit point; used to predict visibility-AOV
    /// attempt counts for primary rays that miss all geometry.
    pub light_sample_count: u32,
    /// Seed mixed into the per-pixel deterministic sample streams.
    pub initial_seed: u32,
    /// Accumulate per-pixel timing into the heat-map channel.
    pub requires_heat_map: bool,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            enable_shadowing: true,
            max_presence_depth: 16,
            light_sample_count: 1,
            initial_seed: 0,
            requires_heat_map: false,
        }
    }
}

impl FrameSettings {
    pub fn validate(&self) -> CoreResult<()> {
        if self.light_sample_count == 0 {
            return Err(CoreError::invalid_config(
                "light_sample_count must be at least 1",
            ));
        }
        if self.max_presence_depth == 0 {
            return Err(CoreError::invalid_config(
                "max_presence_depth must be at least 1",
            ));
        }
        Ok(())
    }
}
