/// Device module - the device/queue seam and presentation surface types

pub mod graphics_device;
pub mod surface;

pub use graphics_device::*;
pub use surface::*;

// Mock device for tests (no GPU required)
#[cfg(test)]
pub mod mock_device;
