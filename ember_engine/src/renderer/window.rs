//! Window-system seam used by the frame loop

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use crate::device::Extent2D;

/// What the frame loop needs from the host window
pub trait WindowSystem {
    /// Current drawable size in pixels (0×0 while minimized)
    fn framebuffer_size(&self) -> Extent2D;

    /// Block until at least one window event has been processed
    fn wait_events(&mut self);

    /// True once the user asked to close the window
    fn close_requested(&self) -> bool {
        false
    }
}

/// Shared "window was resized" dirty flag
///
/// Clones share the same flag, so one can be moved into the window resize
/// callback while the frame loop keeps another.
#[derive(Debug, Clone, Default)]
pub struct ResizeFlag(Arc<AtomicBool>);

impl ResizeFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}
