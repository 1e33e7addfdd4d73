//! Cooperative cancellation of blocking work

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Raises its flag when dropped.
///
/// Held by an async caller while blocking work polls the flag, so dropping
/// the caller's future stops the work at its next check.
#[derive(Debug, Default)]
pub(crate) struct AbortOnDrop(Arc<AtomicBool>);

impl AbortOnDrop {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Flag to hand to the blocking side
    pub(crate) fn flag(&self) -> Arc<AtomicBool> {
        self.0.clone()
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}
