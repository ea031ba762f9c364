//! GraphicsDevice trait - the device and queue context consumed by the frame loop
//!
//! A backend exposes its device, its graphics queue and its presentation queue
//! through this trait. Handles are opaque associated types; the core only
//! stores them and hands them back.

use std::fmt::Debug;
use bitflags::bitflags;
use crate::error::Result;
use crate::device::surface::{SurfaceFormat, SurfaceSupport};
use crate::renderer::swapchain::SwapchainConfig;

bitflags! {
    /// Pipeline stages a semaphore wait applies to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStageFlags: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_INPUT = 1 << 2;
        const VERTEX_SHADER = 1 << 3;
        const FRAGMENT_SHADER = 1 << 7;
        const EARLY_FRAGMENT_TESTS = 1 << 8;
        const LATE_FRAGMENT_TESTS = 1 << 9;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 10;
        const TRANSFER = 1 << 12;
        const BOTTOM_OF_PIPE = 1 << 13;
        const ALL_COMMANDS = 1 << 16;
    }
}

/// Queue family indices used for graphics and presentation work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// True when one queue family serves both purposes
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices (one or two entries)
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// One graphics queue submission
pub struct Submission<'a, D: GraphicsDevice + ?Sized> {
    /// Pre-recorded work for the acquired image
    pub command_buffer: &'a D::CommandBuffer,
    /// Signalled by acquire when the image can be written
    pub wait_semaphore: &'a D::Semaphore,
    /// Stages that must wait for `wait_semaphore`
    pub wait_stage: PipelineStageFlags,
    /// Signalled when rendering completes
    pub signal_semaphore: &'a D::Semaphore,
    /// Signalled when the submission finishes executing
    pub fence: &'a D::Fence,
}

/// Device and queue context
///
/// Implementations must report staleness from `acquire_next_image` and
/// `present` as [`crate::ember::Error::SwapchainStale`] and anything else as a
/// fatal error variant.
pub trait GraphicsDevice: Send + Sync {
    type Semaphore: Copy + Debug + PartialEq + Send + Sync + 'static;
    type Fence: Copy + Debug + PartialEq + Send + Sync + 'static;
    type SwapchainHandle: Copy + Debug + PartialEq + Send + Sync + 'static;
    type Image: Copy + Debug + PartialEq + Send + Sync + 'static;
    type ImageView: Copy + Debug + PartialEq + Send + Sync + 'static;
    type Framebuffer: Copy + Debug + PartialEq + Send + Sync + 'static;
    type CommandBuffer: Copy + Debug + PartialEq + Send + Sync + 'static;

    /// Graphics and presentation queue families
    fn queue_families(&self) -> QueueFamilies;

    /// Current capabilities, formats and present modes of the bound surface
    fn surface_support(&self) -> Result<SurfaceSupport>;

    // ===== Swapchain =====

    fn create_swapchain(&self, config: &SwapchainConfig) -> Result<Self::SwapchainHandle>;

    /// Images owned by the chain, in presentation-engine order
    fn swapchain_images(&self, swapchain: Self::SwapchainHandle) -> Result<Vec<Self::Image>>;

    fn create_image_view(&self, image: Self::Image, format: SurfaceFormat) -> Result<Self::ImageView>;

    fn destroy_image_view(&self, view: Self::ImageView);

    fn destroy_swapchain(&self, swapchain: Self::SwapchainHandle);

    /// Request the next presentable image, signalling `signal` when it can be written
    fn acquire_next_image(
        &self,
        swapchain: Self::SwapchainHandle,
        timeout_ns: u64,
        signal: Self::Semaphore,
    ) -> Result<u32>;

    /// Queue `image_index` for presentation once `wait` is signalled
    fn present(
        &self,
        swapchain: Self::SwapchainHandle,
        image_index: u32,
        wait: Self::Semaphore,
    ) -> Result<()>;

    // ===== Synchronization =====

    fn create_semaphore(&self) -> Result<Self::Semaphore>;

    fn destroy_semaphore(&self, semaphore: Self::Semaphore);

    fn create_fence(&self, signaled: bool) -> Result<Self::Fence>;

    fn destroy_fence(&self, fence: Self::Fence);

    /// Block until `fence` is signalled
    fn wait_for_fence(&self, fence: Self::Fence, timeout_ns: u64) -> Result<()>;

    fn reset_fence(&self, fence: Self::Fence) -> Result<()>;

    // ===== Submission =====

    fn submit(&self, submission: &Submission<'_, Self>) -> Result<()>;

    /// Block until every queue is idle
    fn wait_idle(&self) -> Result<()>;

    // ===== Per-image resources =====

    fn destroy_framebuffer(&self, framebuffer: Self::Framebuffer);

    fn free_command_buffer(&self, command_buffer: Self::CommandBuffer);
}
