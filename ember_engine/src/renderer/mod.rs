/// Renderer module - swapchain lifecycle, frame synchronization and the frame loop

pub mod swapchain;
pub mod sync_ring;
pub mod frame_resources;
pub mod window;
pub mod frame_loop;

pub use swapchain::*;
pub use sync_ring::*;
pub use frame_resources::*;
pub use window::*;
pub use frame_loop::*;
