//! Per-image frame resources
//!
//! One framebuffer and one pre-recorded command buffer per swapchain image,
//! supplied by a [`FrameRecorder`]. Rebuilt whenever the swapchain is.

use std::sync::Arc;
use crate::device::GraphicsDevice;
use crate::error::Result;
use crate::renderer::swapchain::Swapchain;

/// Work recorded for one swapchain image
pub struct RecordedFrame<D: GraphicsDevice> {
    pub framebuffer: D::Framebuffer,
    pub command_buffer: D::CommandBuffer,
}

/// Pipeline and resource provider
///
/// The recorder owns everything that depends on the swapchain but is shared
/// between images (depth buffer, render pass, extent-sized pipeline). The
/// framebuffers and command buffers it returns from [`FrameRecorder::record`]
/// are owned by [`FrameResources`] and released through the device.
pub trait FrameRecorder<D: GraphicsDevice> {
    /// Build the swapchain-dependent state for `swapchain`
    fn prepare(&mut self, swapchain: &Swapchain<D>) -> Result<()>;

    /// Record the work that draws into image `image_index`
    fn record(&mut self, swapchain: &Swapchain<D>, image_index: usize) -> Result<RecordedFrame<D>>;

    /// Drop the swapchain-dependent state (called after the frame resources are gone)
    fn release(&mut self);
}

/// One entry per swapchain image
pub struct FrameResource<D: GraphicsDevice> {
    pub framebuffer: D::Framebuffer,
    pub command_buffer: D::CommandBuffer,
    /// Ring slot whose fence covers the latest submission of this entry
    pub last_slot: Option<usize>,
}

/// Frame resources for every image of one swapchain
pub struct FrameResources<D: GraphicsDevice> {
    device: Arc<D>,
    frames: Vec<FrameResource<D>>,
}

impl<D: GraphicsDevice> FrameResources<D> {
    /// Prepare the recorder and record one entry per swapchain image
    ///
    /// On failure the entries recorded so far are released before returning.
    pub fn record<R: FrameRecorder<D> + ?Sized>(
        device: Arc<D>,
        recorder: &mut R,
        swapchain: &Swapchain<D>,
    ) -> Result<Self> {
        recorder.prepare(swapchain)?;

        let mut resources = Self {
            device,
            frames: Vec::with_capacity(swapchain.image_count()),
        };

        for image_index in 0..swapchain.image_count() {
            match recorder.record(swapchain, image_index) {
                Ok(recorded) => resources.frames.push(FrameResource {
                    framebuffer: recorded.framebuffer,
                    command_buffer: recorded.command_buffer,
                    last_slot: None,
                }),
                Err(e) => {
                    drop(resources);
                    recorder.release();
                    return Err(e);
                }
            }
        }

        crate::engine_debug!(
            "ember::FrameResources",
            "Recorded {} per-image command buffers",
            resources.frames.len()
        );

        Ok(resources)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, image_index: usize) -> Option<&FrameResource<D>> {
        self.frames.get(image_index)
    }

    pub fn get_mut(&mut self, image_index: usize) -> Option<&mut FrameResource<D>> {
        self.frames.get_mut(image_index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameResource<D>> {
        self.frames.iter()
    }
}

impl<D: GraphicsDevice> Drop for FrameResources<D> {
    fn drop(&mut self) {
        for frame in self.frames.drain(..) {
            self.device.free_command_buffer(frame.command_buffer);
            self.device.destroy_framebuffer(frame.framebuffer);
        }
    }
}
