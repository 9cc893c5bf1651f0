//! Running ray statistics.
//!
//! Lock-free counters shared by all render threads. Counts are advisory
//! (used for logging and scheduler heuristics), so relaxed ordering is
//! sufficient everywhere.

use std::sync::atomic::{AtomicU64, Ordering};

/// Central registry of per-frame ray counters.
///
/// One instance is shared by reference across render threads; all
/// increments are relaxed atomics.
#[derive(Debug, Default)]
pub struct RayStats {
    occlusion_rays: AtomicU64,
    bundled_occlusion_rays: AtomicU64,
    gpu_occlusion_rays: AtomicU64,
    presence_rays: AtomicU64,
    intersection_rays: AtomicU64,
    bundled_intersection_rays: AtomicU64,
    radiance_records: AtomicU64,
}

/// Point-in-time copy of the counters for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RayStatsSnapshot {
    pub occlusion_rays: u64,
    pub bundled_occlusion_rays: u64,
    pub gpu_occlusion_rays: u64,
    pub presence_rays: u64,
    pub intersection_rays: u64,
    pub bundled_intersection_rays: u64,
    pub radiance_records: u64,
}

impl RayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_occlusion_rays(&self, n: u64) {
        self.occlusion_rays.fetch_add(n, Ordering::Relaxed);
        self.bundled_occlusion_rays.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_gpu_occlusion_rays(&self, n: u64) {
        self.gpu_occlusion_rays.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_presence_rays(&self, n: u64) {
        self.presence_rays.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_intersection_rays(&self, n: u64) {
        self.intersection_rays.fetch_add(n, Ordering::Relaxed);
        self.bundled_intersection_rays
            .fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_radiance_records(&self, n: u64) {
        self.radiance_records.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RayStatsSnapshot {
        RayStatsSnapshot {
            occlusion_rays: self.occlusion_rays.load(Ordering::Relaxed),
            bundled_occlusion_rays: self.bundled_occlusion_rays.load(Ordering::Relaxed),
            gpu_occlusion_rays: self.gpu_occlusion_rays.load(Ordering::Relaxed),
            presence_rays: self.presence_rays.load(Ordering::Relaxed),
            intersection_rays: self.intersection_rays.load(Ordering::Relaxed),
            bundled_intersection_rays: self.bundled_intersection_rays.load(Ordering::Relaxed),
            radiance_records: self.radiance_records.load(Ordering::Relaxed),
        }
    }
}
