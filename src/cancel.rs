//! Cooperative cancellation for in-flight batches.
//!
//! An external controller raises the token at any time; handlers poll it
//! after the expensive phases (post-intersection, post-miss-evaluation,
//! between shade-queue span submissions) and return early. Entries already
//! completed stay valid; entries not yet reached are abandoned.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag, checked between batch phases.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    /// Raise the cancellation signal. Safe to call from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Clear the signal. Called by the external scheduler between frames.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Relaxed);
    }
}
