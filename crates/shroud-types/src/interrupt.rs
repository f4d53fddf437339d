//! Cooperative cancellation flag.
//!
//! The engine is single-threaded; the flag is the one concurrency
//! primitive. Groupify polls it at class boundaries and the search polls
//! it between node checks. Observers abandon work without leaking partial
//! snapshots.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag. Cheap to clone; all clones observe the same
/// state.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from another thread.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Clear the flag so the handle can be reused for another run.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }

    /// Poll the flag.
    #[inline]
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}
