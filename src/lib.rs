//! Bundled (wavefront) ray-execution core.
//!
//! This crate owns the middle of a wavefront path tracer: batches of
//! in-flight rays arrive from an external ray-generation layer, get
//! intersection/occlusion tested against a pluggable accelerator (CPU or
//! GPU), have volume radiance and transmittance folded in, and are then
//! either converted into radiance records (pushed to an append-only result
//! sink) or sorted by material and handed to per-material shade queues.
//!
//! The hard contract throughout: every ray-state pool slot and every
//! auxiliary payload handle (occlusion data list, deep data, cryptomatte
//! data) is released exactly once on every exit path, including cooperative
//! cancellation mid-batch.
//!
//! Entry points are [`handlers::process_occlusion_batch`],
//! [`handlers::process_presence_batch`],
//! [`handlers::process_intersection_batch`] and
//! [`handlers::process_gpu_occlusion_batch`].

pub mod accel;
pub mod aov;
pub mod cancel;
pub mod error;
pub mod handlers;
pub mod handles;
pub mod light;
pub mod material;
pub mod pool;
pub mod ray;
pub mod records;
pub mod sampler;
pub mod scratch;
pub mod settings;
pub mod sort;
pub mod stats;
pub mod volume;

pub use cancel::CancelToken;
pub use error::{CoreError, CoreResult};
pub use handlers::{FrameState, RayHandlerFlags, RenderTls};
pub use pool::RayStatePool;
pub use records::{BundledOcclRay, BundledRadiance, OcclTestType, RadianceSink};
pub use settings::FrameSettings;
