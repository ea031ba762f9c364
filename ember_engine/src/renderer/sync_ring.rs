//! Synchronization ring - one set of sync objects per frame in flight
//!
//! The ring size is the CPU/GPU overlap policy and is independent of the
//! swapchain image count. Slots are never resized or recreated with the chain.

use std::sync::Arc;
use crate::device::GraphicsDevice;
use crate::error::{Error, Result};

/// Sync objects of one frame in flight
pub struct FrameSync<D: GraphicsDevice> {
    /// Acquire → submit: the image can be written
    pub image_available: D::Semaphore,
    /// Submit → present: rendering into the image is complete
    pub render_finished: D::Semaphore,
    /// GPU → CPU: the slot's last submission finished executing
    pub in_flight: D::Fence,
}

impl<D: GraphicsDevice> Clone for FrameSync<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: GraphicsDevice> Copy for FrameSync<D> {}

/// Fixed ring of `F` [`FrameSync`] slots
pub struct SyncRing<D: GraphicsDevice> {
    device: Arc<D>,
    slots: Vec<FrameSync<D>>,
    current: usize,
}

impl<D: GraphicsDevice> SyncRing<D> {
    /// Create `frames_in_flight` slots
    ///
    /// Fences start signalled so the first use of each slot does not block.
    pub fn new(device: Arc<D>, frames_in_flight: usize) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(Error::InvalidResource(
                "synchronization ring needs at least one slot".to_string(),
            ));
        }

        let mut ring = Self {
            device,
            slots: Vec::with_capacity(frames_in_flight),
            current: 0,
        };

        for _ in 0..frames_in_flight {
            let slot = ring.create_slot()?;
            ring.slots.push(slot);
        }

        crate::engine_debug!("ember::SyncRing", "Created {} frame slots", frames_in_flight);

        Ok(ring)
    }

    fn create_slot(&self) -> Result<FrameSync<D>> {
        let image_available = self.device.create_semaphore()?;
        let render_finished = match self.device.create_semaphore() {
            Ok(semaphore) => semaphore,
            Err(e) => {
                self.device.destroy_semaphore(image_available);
                return Err(e);
            }
        };
        let in_flight = match self.device.create_fence(true) {
            Ok(fence) => fence,
            Err(e) => {
                self.device.destroy_semaphore(render_finished);
                self.device.destroy_semaphore(image_available);
                return Err(e);
            }
        };
        Ok(FrameSync {
            image_available,
            render_finished,
            in_flight,
        })
    }

    /// Index of the slot the next frame uses, always in `[0, len)`
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &FrameSync<D> {
        &self.slots[self.current]
    }

    pub fn slot(&self, index: usize) -> Option<&FrameSync<D>> {
        self.slots.get(index)
    }

    /// Move to `(current + 1) mod F` and return the new index
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.slots.len();
        self.current
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<D: GraphicsDevice> Drop for SyncRing<D> {
    fn drop(&mut self) {
        for slot in self.slots.drain(..) {
            self.device.destroy_fence(slot.in_flight);
            self.device.destroy_semaphore(slot.render_finished);
            self.device.destroy_semaphore(slot.image_available);
        }
    }
}

#[cfg(test)]
#[path = "sync_ring_tests.rs"]
mod tests;
