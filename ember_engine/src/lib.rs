/*!
# Ember Engine

Platform-agnostic core of the Ember renderer: swapchain lifecycle, frame
synchronization and the frame loop that drives a GPU presentation chain.

The core never talks to a graphics API directly. Everything GPU-facing goes
through the [`ember::device::GraphicsDevice`] trait, implemented by a backend
crate (see `ember_engine_renderer_vulkan`) and by a mock device in unit tests.

## Architecture

- **Swapchain**: chain + image views, built from surface support with the
  format / present mode / extent / image count policies
- **SyncRing**: F frames-in-flight slots (two semaphores and a fence each)
- **FrameResources**: one framebuffer + pre-recorded command buffer per image,
  produced by a [`ember::render::FrameRecorder`]
- **FrameLoop**: wait, acquire, submit, present, advance, and transparent
  recreation when the chain goes stale
*/

// Internal modules
mod error;
mod engine;
mod config;
pub mod log;
pub mod device;
pub mod renderer;
pub mod resource;

// Main ember namespace module
pub mod ember {
    // Error types
    pub use crate::error::{Error, Result, StaleReason};

    // Logger facade
    pub use crate::engine::Engine;

    // Configuration
    pub use crate::config::{
        RendererConfig, DebugSeverity, DebugOutput, DebugMessageFilter, ValidationStats,
    };

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Device seam and surface types
    pub mod device {
        pub use crate::device::*;
    }

    // Swapchain, synchronization and frame loop
    pub mod render {
        pub use crate::renderer::*;
    }

    // CPU-side resource data
    pub mod resource {
        pub use crate::resource::*;
    }
}

// Re-export math library at crate root
pub use glam;
