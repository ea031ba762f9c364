//! Presentation surface types
//!
//! Backend-neutral description of what a window surface can host. The
//! swapchain selection policy works on these values only, so it can be tested
//! without a GPU.

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (minimized window)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Component-wise clamp into `[min, max]`
    pub fn clamp(&self, min: Extent2D, max: Extent2D) -> Extent2D {
        Extent2D {
            width: self.width.max(min.width).min(max.width.max(min.width)),
            height: self.height.max(min.height).min(max.height.max(min.height)),
        }
    }

    /// True when `min <= self <= max` component-wise
    pub fn fits_within(&self, min: Extent2D, max: Extent2D) -> bool {
        self.width >= min.width
            && self.height >= min.height
            && self.width <= max.width
            && self.height <= max.height
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

/// Presentable pixel formats
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Sentinel: the surface expresses no preference
    Undefined,
    B8G8R8A8Srgb,
    B8G8R8A8Unorm,
    R8G8B8A8Srgb,
    R8G8B8A8Unorm,
    /// Any other backend format, by raw value
    Other(i32),
}

impl PixelFormat {
    pub fn is_srgb(&self) -> bool {
        matches!(self, PixelFormat::B8G8R8A8Srgb | PixelFormat::R8G8B8A8Srgb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonlinear,
    Other(i32),
}

/// A (pixel format, color space) pair a surface supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: PixelFormat,
    pub color_space: ColorSpace,
}

impl SurfaceFormat {
    /// Preferred 8-bit-per-channel sRGB pair
    pub const CANONICAL: SurfaceFormat = SurfaceFormat {
        format: PixelFormat::B8G8R8A8Srgb,
        color_space: ColorSpace::SrgbNonlinear,
    };

    pub const fn new(format: PixelFormat, color_space: ColorSpace) -> Self {
        Self { format, color_space }
    }
}

/// Ordering policy for handing images to the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    /// No queueing, may tear
    Immediate,
    /// Replace-on-full queue, low latency without tearing
    Mailbox,
    /// Strict FIFO, always supported
    Fifo,
    /// FIFO that may tear when late
    FifoRelaxed,
}

/// Limits reported by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means no upper limit
    pub max_image_count: u32,
    /// `None` when the surface lets the swapchain pick its size
    pub current_extent: Option<Extent2D>,
    pub min_image_extent: Extent2D,
    pub max_image_extent: Extent2D,
}

/// Everything the swapchain policy needs to know about a surface
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSupport {
    pub capabilities: SurfaceCapabilities,
    pub formats: Vec<SurfaceFormat>,
    pub present_modes: Vec<PresentMode>,
}

impl SurfaceSupport {
    /// A surface can host a swapchain only with at least one format and one present mode
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

#[cfg(test)]
#[path = "surface_tests.rs"]
mod tests;
