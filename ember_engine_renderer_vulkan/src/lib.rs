/*!
# Ember Engine - Vulkan Backend

Vulkan implementation of the ember_engine `GraphicsDevice` trait, plus a
`FrameRecorder` that draws one textured mesh.

Built on `ash` for the Vulkan bindings, `ash-window` for surface creation and
`gpu-allocator` for memory management.

```no_run
use std::sync::Arc;
use ember_engine::ember::RendererConfig;
use ember_engine::ember::resource::{Mesh, TextureData};
use ember_engine_renderer_vulkan::ember::{ModelRecorder, VulkanDevice};
# fn run(window: &winit::window::Window, vs: &[u8], fs: &[u8]) -> ember_engine::ember::Result<()> {
let config = RendererConfig::default();
let device = Arc::new(VulkanDevice::new(window, &config)?);
let texture = TextureData::checkerboard(256, 32, [255, 255, 255, 255], [40, 40, 40, 255]);
let recorder = ModelRecorder::new(Arc::clone(&device), &Mesh::cube(), &texture, vs, fs)?;
# Ok(())
# }
```
*/

mod vulkan_context;
mod vulkan_device;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_shader;
mod vulkan_pipeline;
mod model_recorder;

#[cfg(feature = "vulkan-validation")]
mod debug;

// Main ember namespace module
pub mod ember {
    pub use crate::vulkan_context::GpuContext;
    pub use crate::vulkan_device::VulkanDevice;
    pub use crate::model_recorder::{model_view_projection, ModelRecorder};

    // GPU resources
    pub use crate::vulkan_buffer::Buffer;
    pub use crate::vulkan_texture::{DepthBuffer, Texture};
    pub use crate::vulkan_shader::{reflect_interface, Shader, ShaderInterface, ShaderStage};
    pub use crate::vulkan_pipeline::{ModelPipeline, RenderPass, TextureBinding, MVP_PUSH_CONSTANT_SIZE};

    // Validation statistics (vulkan-validation feature only)
    #[cfg(feature = "vulkan-validation")]
    pub use crate::debug::{get_validation_stats, print_validation_stats_report};
}
