/// Conversions between engine surface/sync types and Vulkan types
///
/// Pure functions, no device needed.

use ash::vk;
use ember_engine::ember::{Error, StaleReason};
use ember_engine::ember::device::{
    ColorSpace, Extent2D, PipelineStageFlags, PixelFormat, PresentMode, SurfaceCapabilities,
    SurfaceFormat,
};

/// Vulkan format for an engine pixel format
pub(crate) fn pixel_format_to_vk(format: PixelFormat) -> vk::Format {
    match format {
        PixelFormat::Undefined => vk::Format::UNDEFINED,
        PixelFormat::B8G8R8A8Srgb => vk::Format::B8G8R8A8_SRGB,
        PixelFormat::B8G8R8A8Unorm => vk::Format::B8G8R8A8_UNORM,
        PixelFormat::R8G8B8A8Srgb => vk::Format::R8G8B8A8_SRGB,
        PixelFormat::R8G8B8A8Unorm => vk::Format::R8G8B8A8_UNORM,
        PixelFormat::Other(raw) => vk::Format::from_raw(raw),
    }
}

/// Engine pixel format for a Vulkan format (unknown formats keep their raw value)
pub(crate) fn pixel_format_from_vk(format: vk::Format) -> PixelFormat {
    match format {
        vk::Format::UNDEFINED => PixelFormat::Undefined,
        vk::Format::B8G8R8A8_SRGB => PixelFormat::B8G8R8A8Srgb,
        vk::Format::B8G8R8A8_UNORM => PixelFormat::B8G8R8A8Unorm,
        vk::Format::R8G8B8A8_SRGB => PixelFormat::R8G8B8A8Srgb,
        vk::Format::R8G8B8A8_UNORM => PixelFormat::R8G8B8A8Unorm,
        other => PixelFormat::Other(other.as_raw()),
    }
}

pub(crate) fn color_space_to_vk(color_space: ColorSpace) -> vk::ColorSpaceKHR {
    match color_space {
        ColorSpace::SrgbNonlinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ColorSpace::Other(raw) => vk::ColorSpaceKHR::from_raw(raw),
    }
}

pub(crate) fn color_space_from_vk(color_space: vk::ColorSpaceKHR) -> ColorSpace {
    match color_space {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => ColorSpace::SrgbNonlinear,
        other => ColorSpace::Other(other.as_raw()),
    }
}

pub(crate) fn surface_format_from_vk(format: &vk::SurfaceFormatKHR) -> SurfaceFormat {
    SurfaceFormat::new(
        pixel_format_from_vk(format.format),
        color_space_from_vk(format.color_space),
    )
}

pub(crate) fn present_mode_to_vk(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

/// `None` for modes the engine does not drive (shared refresh modes, extensions)
pub(crate) fn present_mode_from_vk(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

pub(crate) fn extent_to_vk(extent: Extent2D) -> vk::Extent2D {
    vk::Extent2D {
        width: extent.width,
        height: extent.height,
    }
}

pub(crate) fn extent_from_vk(extent: vk::Extent2D) -> Extent2D {
    Extent2D::new(extent.width, extent.height)
}

/// `current_extent` of `u32::MAX` is the "window decides" sentinel
pub(crate) fn capabilities_from_vk(caps: &vk::SurfaceCapabilitiesKHR) -> SurfaceCapabilities {
    let current_extent = if caps.current_extent.width == u32::MAX {
        None
    } else {
        Some(extent_from_vk(caps.current_extent))
    };

    SurfaceCapabilities {
        min_image_count: caps.min_image_count,
        max_image_count: caps.max_image_count,
        current_extent,
        min_image_extent: extent_from_vk(caps.min_image_extent),
        max_image_extent: extent_from_vk(caps.max_image_extent),
    }
}

pub(crate) fn pipeline_stages_to_vk(stages: PipelineStageFlags) -> vk::PipelineStageFlags {
    // Engine bits mirror the Vulkan bit positions
    vk::PipelineStageFlags::from_raw(stages.bits())
}

/// Map an acquire/present failure to the engine taxonomy
pub(crate) fn presentation_error(result: vk::Result, operation: &str) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_DATE_KHR => Error::SwapchainStale(StaleReason::OutOfDate),
        vk::Result::SUBOPTIMAL_KHR => Error::SwapchainStale(StaleReason::Suboptimal),
        vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost(format!("{} failed: {:?}", operation, result)),
        vk::Result::ERROR_SURFACE_LOST_KHR => {
            Error::SurfaceIncompatible(format!("{} failed: surface lost", operation))
        }
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            Error::OutOfMemory
        }
        other => Error::BackendError(format!("{} failed: {:?}", operation, other)),
    }
}

/// First candidate whose optimal tiling supports depth attachments
pub(crate) fn pick_depth_format<F>(candidates: &[vk::Format], mut optimal_features: F) -> Option<vk::Format>
where
    F: FnMut(vk::Format) -> vk::FormatFeatureFlags,
{
    candidates.iter().copied().find(|&format| {
        optimal_features(format).contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
}

/// Depth formats in order of preference
pub(crate) const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

pub(crate) fn has_stencil_component(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT
    )
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
