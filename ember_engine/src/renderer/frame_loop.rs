//! Frame loop - drives one frame per call through acquire, submit, present
//!
//! ```text
//! Wait-For-Slot ─► [resize flag?] ─► Acquire ─► Submit ─► Present ─► Advance
//!                        │              │
//!                        └──────────────┴──► Stale-Recreate (frame skipped)
//! ```
//!
//! Staleness (out-of-date, suboptimal, resize) is absorbed by rebuilding the
//! swapchain and its frame resources. Anything else is fatal and returned to
//! the caller. Present failures only schedule a rebuild.

use std::sync::Arc;
use crate::config::RendererConfig;
use crate::device::{GraphicsDevice, PipelineStageFlags, Submission};
use crate::error::{Error, Result, StaleReason};
use crate::renderer::frame_resources::{FrameRecorder, FrameResources};
use crate::renderer::swapchain::Swapchain;
use crate::renderer::sync_ring::SyncRing;
use crate::renderer::window::{ResizeFlag, WindowSystem};

/// Counters since the loop was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_presented: u64,
    /// Frames abandoned before submission (stale chain, resize, minimized)
    pub frames_skipped: u64,
    pub recreations: u64,
    pub present_failures: u64,
}

/// Owner of the swapchain, its frame resources and the synchronization ring
///
/// # Example
///
/// ```ignore
/// let mut frame_loop = FrameLoop::new(device, recorder, window, RendererConfig::default())?;
/// let resize = frame_loop.resize_flag();
/// // hand `resize` to the window callback, then once per tick:
/// frame_loop.draw_frame()?;
/// ```
pub struct FrameLoop<D, R, W>
where
    D: GraphicsDevice,
    R: FrameRecorder<D>,
    W: WindowSystem,
{
    device: Arc<D>,
    recorder: R,
    window: W,
    config: RendererConfig,
    frames: Option<FrameResources<D>>,
    swapchain: Option<Swapchain<D>>,
    ring: SyncRing<D>,
    resize_flag: ResizeFlag,
    stats: FrameStats,
}

impl<D, R, W> FrameLoop<D, R, W>
where
    D: GraphicsDevice,
    R: FrameRecorder<D>,
    W: WindowSystem,
{
    /// Create the ring and the first swapchain
    ///
    /// Blocks while the window is minimized. If the window is closed before it
    /// ever becomes drawable, the loop starts without a swapchain and the first
    /// `draw_frame` tries again.
    pub fn new(device: Arc<D>, recorder: R, window: W, config: RendererConfig) -> Result<Self> {
        config.validate()?;

        let ring = SyncRing::new(device.clone(), config.frames_in_flight)?;

        let mut frame_loop = Self {
            device,
            recorder,
            window,
            config,
            frames: None,
            swapchain: None,
            ring,
            resize_flag: ResizeFlag::new(),
            stats: FrameStats::default(),
        };

        if frame_loop.wait_for_drawable() {
            frame_loop.build()?;
        } else {
            frame_loop.resize_flag.mark();
        }

        crate::engine_info!(
            "ember::FrameLoop",
            "Frame loop ready ({} frames in flight)",
            frame_loop.ring.len()
        );

        Ok(frame_loop)
    }

    /// Advance exactly one frame
    ///
    /// Returns `Ok(())` both for a presented frame and for a frame skipped
    /// because the swapchain had to be rebuilt. Errors are fatal.
    pub fn draw_frame(&mut self) -> Result<()> {
        let current = self.ring.current_index();
        let sync = *self.ring.current();

        // Wait-For-Slot
        self.device
            .wait_for_fence(sync.in_flight, u64::MAX)
            .map_err(|e| self.fatal("wait for frame slot", e))?;

        if self.resize_flag.is_set() {
            return self.skip_frame(StaleReason::Resized);
        }

        let handle = match &self.swapchain {
            Some(swapchain) if self.frames.is_some() => swapchain.handle(),
            _ => return self.skip_frame(StaleReason::ZeroExtent),
        };

        // Acquire
        let image_index = match self.device.acquire_next_image(
            handle,
            self.config.acquire_timeout_ns,
            sync.image_available,
        ) {
            Ok(index) => index,
            Err(Error::SwapchainStale(reason)) => return self.skip_frame(reason),
            Err(e) => return Err(self.fatal("acquire", e)),
        };

        let (command_buffer, previous_slot) = match self
            .frames
            .as_ref()
            .and_then(|frames| frames.get(image_index as usize))
        {
            Some(frame) => (frame.command_buffer, frame.last_slot),
            None => {
                return Err(self.fatal(
                    "acquire",
                    Error::InvalidResource(format!("acquired image index {} out of range", image_index)),
                ))
            }
        };

        // The image's recorded work may still be pending from another slot
        if let Some(previous) = previous_slot.filter(|&slot| slot != current) {
            if let Some(other) = self.ring.slot(previous) {
                let fence = other.in_flight;
                self.device
                    .wait_for_fence(fence, u64::MAX)
                    .map_err(|e| self.fatal("wait for image", e))?;
            }
        }

        // Submit
        self.device
            .reset_fence(sync.in_flight)
            .map_err(|e| self.fatal("reset frame fence", e))?;

        let submission = Submission::<D> {
            command_buffer: &command_buffer,
            wait_semaphore: &sync.image_available,
            wait_stage: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: &sync.render_finished,
            fence: &sync.in_flight,
        };
        self.device
            .submit(&submission)
            .map_err(|e| self.fatal("submit", e))?;

        if let Some(frame) = self.frames.as_mut().and_then(|f| f.get_mut(image_index as usize)) {
            frame.last_slot = Some(current);
        }

        // Present
        match self.device.present(handle, image_index, sync.render_finished) {
            Ok(()) => self.stats.frames_presented += 1,
            Err(Error::SwapchainStale(reason)) => {
                crate::engine_debug!(
                    "ember::FrameLoop",
                    "Present reported stale swapchain ({}), rebuilding next frame",
                    reason
                );
                self.stats.frames_presented += 1;
                self.resize_flag.mark();
            }
            Err(e) => {
                crate::engine_warn!(
                    "ember::FrameLoop",
                    "Present of image {} failed: {}",
                    image_index,
                    e
                );
                self.stats.present_failures += 1;
                self.resize_flag.mark();
            }
        }

        // Advance
        self.ring.advance();
        Ok(())
    }

    /// Rebuild the swapchain and frame resources now
    pub fn recreate_swapchain(&mut self) -> Result<()> {
        self.recreate(StaleReason::Resized)
    }

    /// Cloneable handle to the resize dirty flag, for the window callback
    pub fn resize_flag(&self) -> ResizeFlag {
        self.resize_flag.clone()
    }

    /// Mark the swapchain stale; the next frame rebuilds it
    pub fn notify_resized(&self) {
        self.resize_flag.mark();
    }

    /// Ring slot the next frame uses
    pub fn current_frame(&self) -> usize {
        self.ring.current_index()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.ring.len()
    }

    pub fn swapchain(&self) -> Option<&Swapchain<D>> {
        self.swapchain.as_ref()
    }

    pub fn frame_resources(&self) -> Option<&FrameResources<D>> {
        self.frames.as_ref()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    // ===== Stale-Recreate =====

    fn skip_frame(&mut self, reason: StaleReason) -> Result<()> {
        self.stats.frames_skipped += 1;
        crate::engine_debug!(
            "ember::FrameLoop",
            "Frame skipped ({}), slot {} kept",
            reason,
            self.ring.current_index()
        );
        self.recreate(reason)
    }

    fn recreate(&mut self, reason: StaleReason) -> Result<()> {
        self.resize_flag.take();

        if !self.wait_for_drawable() {
            crate::engine_debug!(
                "ember::FrameLoop",
                "Window closed while minimized, swapchain rebuild abandoned"
            );
            self.resize_flag.mark();
            return Ok(());
        }

        crate::engine_info!("ember::FrameLoop", "Recreating swapchain ({})", reason);

        self.device
            .wait_idle()
            .map_err(|e| self.fatal("drain device before recreation", e))?;

        self.release_swapchain();
        self.stats.recreations += 1;

        self.build()
    }

    /// Poll window events until the framebuffer has a non-zero size
    ///
    /// Returns false if the window asked to close first.
    fn wait_for_drawable(&mut self) -> bool {
        loop {
            if !self.window.framebuffer_size().is_empty() {
                return true;
            }
            if self.window.close_requested() {
                return false;
            }
            self.window.wait_events();
        }
    }

    fn build(&mut self) -> Result<()> {
        let support = self
            .device
            .surface_support()
            .map_err(|e| self.fatal("query surface support", e))?;

        let swapchain = match Swapchain::create(
            self.device.clone(),
            &support,
            self.window.framebuffer_size(),
            self.config.vsync,
        ) {
            Ok(swapchain) => swapchain,
            Err(Error::SwapchainStale(reason)) => {
                crate::engine_debug!(
                    "ember::FrameLoop",
                    "Surface not ready for a swapchain ({}), retrying next frame",
                    reason
                );
                self.resize_flag.mark();
                return Ok(());
            }
            Err(e) => return Err(self.fatal("create swapchain", e)),
        };

        let frames = FrameResources::record(self.device.clone(), &mut self.recorder, &swapchain)
            .map_err(|e| self.fatal("record frame resources", e))?;

        self.swapchain = Some(swapchain);
        self.frames = Some(frames);
        Ok(())
    }

    /// Frame resources, then recorder state, then the chain
    fn release_swapchain(&mut self) {
        self.frames = None;
        self.recorder.release();
        self.swapchain = None;
    }

    fn fatal(&self, stage: &str, error: Error) -> Error {
        crate::engine_error!("ember::FrameLoop", "Fatal error during {}: {}", stage, error);
        error
    }
}

impl<D, R, W> Drop for FrameLoop<D, R, W>
where
    D: GraphicsDevice,
    R: FrameRecorder<D>,
    W: WindowSystem,
{
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            crate::engine_warn!("ember::FrameLoop", "wait_idle failed during shutdown: {}", e);
        }
        self.release_swapchain();
        // `ring` is dropped after this body
    }
}

#[cfg(test)]
#[path = "frame_loop_tests.rs"]
mod tests;
