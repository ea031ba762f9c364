//! Swapchain - the rotating set of presentable images and their views
//!
//! Format, present mode, resolution and image count are chosen by policy from
//! what the surface reports (see the `choose_*` functions). A [`Swapchain`] is
//! never patched in place: it is dropped and created again when it goes stale.

use std::sync::Arc;
use crate::device::{
    GraphicsDevice, Extent2D, PixelFormat, PresentMode, SurfaceCapabilities, SurfaceFormat,
    SurfaceSupport,
};
use crate::error::{Error, Result, StaleReason};

/// Pick the surface format
///
/// The sole-`Undefined` sentinel means "no preference" and yields
/// [`SurfaceFormat::CANONICAL`] directly. Otherwise the canonical pair is used when
/// listed, else the first listed pair.
pub fn choose_surface_format(formats: &[SurfaceFormat]) -> Result<SurfaceFormat> {
    match formats {
        [] => Err(Error::SurfaceIncompatible(
            "surface reports no formats".to_string(),
        )),
        [only] if only.format == PixelFormat::Undefined => Ok(SurfaceFormat::CANONICAL),
        _ => Ok(formats
            .iter()
            .copied()
            .find(|f| *f == SurfaceFormat::CANONICAL)
            .unwrap_or(formats[0])),
    }
}

/// Pick the present mode
///
/// Mailbox, then Immediate, then Fifo (always available). `vsync` forces Fifo.
pub fn choose_present_mode(modes: &[PresentMode], vsync: bool) -> Result<PresentMode> {
    if modes.is_empty() {
        return Err(Error::SurfaceIncompatible(
            "surface reports no present modes".to_string(),
        ));
    }
    if vsync {
        return Ok(PresentMode::Fifo);
    }
    if modes.contains(&PresentMode::Mailbox) {
        Ok(PresentMode::Mailbox)
    } else if modes.contains(&PresentMode::Immediate) {
        Ok(PresentMode::Immediate)
    } else {
        Ok(PresentMode::Fifo)
    }
}

/// Pick the resolution
///
/// A definite current extent is used verbatim; otherwise the framebuffer size
/// is clamped into the surface's [min, max] extent.
pub fn choose_extent(capabilities: &SurfaceCapabilities, framebuffer_size: Extent2D) -> Extent2D {
    match capabilities.current_extent {
        Some(extent) => extent,
        None => framebuffer_size.clamp(
            capabilities.min_image_extent,
            capabilities.max_image_extent,
        ),
    }
}

/// `min + 1`, clamped into [min, max] unless max is 0 (no upper limit)
pub fn choose_image_count(capabilities: &SurfaceCapabilities) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.clamp(
            capabilities.min_image_count,
            capabilities.max_image_count.max(capabilities.min_image_count),
        )
    } else {
        count
    }
}

/// Parameters a backend needs to create a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub surface_format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub extent: Extent2D,
    pub image_count: u32,
}

impl SwapchainConfig {
    /// Apply every selection policy to the reported surface support
    pub fn choose(support: &SurfaceSupport, framebuffer_size: Extent2D, vsync: bool) -> Result<Self> {
        Ok(Self {
            surface_format: choose_surface_format(&support.formats)?,
            present_mode: choose_present_mode(&support.present_modes, vsync)?,
            extent: choose_extent(&support.capabilities, framebuffer_size),
            image_count: choose_image_count(&support.capabilities),
        })
    }
}

/// A live chain with one view per image
///
/// `images[i]` and `image_views[i]` always refer to the same image.
/// Dropping the swapchain destroys the views in order and then the chain; the
/// owner must make sure no GPU work still references it.
pub struct Swapchain<D: GraphicsDevice> {
    device: Arc<D>,
    handle: D::SwapchainHandle,
    config: SwapchainConfig,
    images: Vec<D::Image>,
    image_views: Vec<D::ImageView>,
}

impl<D: GraphicsDevice> Swapchain<D> {
    /// Create a chain for the device's surface
    ///
    /// Fails with `SwapchainStale(ZeroExtent)` without creating anything when the
    /// chosen extent has a zero dimension.
    pub fn create(
        device: Arc<D>,
        support: &SurfaceSupport,
        framebuffer_size: Extent2D,
        vsync: bool,
    ) -> Result<Self> {
        let config = SwapchainConfig::choose(support, framebuffer_size, vsync)?;
        if config.extent.is_empty() {
            return Err(Error::SwapchainStale(StaleReason::ZeroExtent));
        }

        let handle = device.create_swapchain(&config)?;

        // From here on Drop releases whatever was created
        let mut swapchain = Self {
            device,
            handle,
            config,
            images: Vec::new(),
            image_views: Vec::new(),
        };

        swapchain.images = swapchain.device.swapchain_images(handle)?;
        if swapchain.images.is_empty() {
            return Err(Error::ResourceCreationFailed(
                "swapchain reported no images".to_string(),
            ));
        }

        for image in swapchain.images.clone() {
            let view = swapchain.device.create_image_view(image, config.surface_format)?;
            swapchain.image_views.push(view);
        }

        crate::engine_info!(
            "ember::Swapchain",
            "Created {}x{} swapchain: {} images, {:?}, {:?}/{:?}",
            config.extent.width,
            config.extent.height,
            swapchain.images.len(),
            config.present_mode,
            config.surface_format.format,
            config.surface_format.color_space
        );

        Ok(swapchain)
    }

    /// Backend handle of the chain
    pub fn handle(&self) -> D::SwapchainHandle {
        self.handle
    }

    pub fn config(&self) -> &SwapchainConfig {
        &self.config
    }

    pub fn extent(&self) -> Extent2D {
        self.config.extent
    }

    pub fn surface_format(&self) -> SurfaceFormat {
        self.config.surface_format
    }

    pub fn present_mode(&self) -> PresentMode {
        self.config.present_mode
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[D::Image] {
        &self.images
    }

    pub fn image_views(&self) -> &[D::ImageView] {
        &self.image_views
    }

    pub fn image_view(&self, index: usize) -> Option<D::ImageView> {
        self.image_views.get(index).copied()
    }
}

impl<D: GraphicsDevice> Drop for Swapchain<D> {
    fn drop(&mut self) {
        for view in self.image_views.drain(..) {
            self.device.destroy_image_view(view);
        }
        self.device.destroy_swapchain(self.handle);
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
