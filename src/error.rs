//! Central error handling for the ray-execution core.
//!
//! Only genuinely recoverable conditions surface as errors: bad
//! configuration and pool sizing/exhaustion. Contract violations (invalid
//! occlusion-test tags, double frees, releasing a dead handle, overflowing
//! a result buffer) are caller bugs and panic via assertions instead.
//! Cancellation is a cooperative early return, never an error.

/// Centralized error type for core operations.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Ray state pool exhausted: requested {requested}, available {available}")]
    PoolExhausted { requested: usize, available: usize },

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),
}

impl CoreError {
    pub fn invalid_config<T: ToString>(msg: T) -> Self {
        CoreError::InvalidConfig(msg.to_string())
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
