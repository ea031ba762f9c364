/// ModelRecorder - records one textured mesh draw per swapchain image

use ash::vk;
use ember_engine::ember::device::{Extent2D, GraphicsDevice};
use ember_engine::ember::render::{FrameRecorder, RecordedFrame, Swapchain};
use ember_engine::ember::resource::{Bounds, Mesh, TextureData};
use ember_engine::ember::{Error, Result};
use ember_engine::{engine_debug, engine_err, engine_info};
use glam::{Mat4, Vec3};
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_device::VulkanDevice;
use crate::vulkan_format::{extent_to_vk, pixel_format_to_vk};
use crate::vulkan_pipeline::{ModelPipeline, RenderPass, TextureBinding, MVP_PUSH_CONSTANT_SIZE};
use crate::vulkan_shader::{check_model_interface, Shader, ShaderStage};
use crate::vulkan_texture::{DepthBuffer, Texture};

const CLEAR_COLOR: [f32; 4] = [0.02, 0.02, 0.05, 1.0];
const FIELD_OF_VIEW_DEGREES: f32 = 45.0;
const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 10.0;

/// Model-view-projection that fits `bounds` into the view at `aspect_ratio`
///
/// The model is centred and scaled to unit radius, seen from a fixed
/// three-quarter view. Y is flipped for Vulkan clip space.
pub fn model_view_projection(bounds: Option<Bounds>, aspect_ratio: f32) -> Mat4 {
    let model = match bounds {
        Some(bounds) if bounds.radius() > f32::EPSILON => {
            Mat4::from_scale(Vec3::splat(1.0 / bounds.radius()))
                * Mat4::from_translation(-bounds.center())
        }
        _ => Mat4::IDENTITY,
    };

    let view = Mat4::look_at_rh(Vec3::new(2.0, 1.5, 2.5), Vec3::ZERO, Vec3::Y);

    let mut projection = Mat4::perspective_rh(
        FIELD_OF_VIEW_DEGREES.to_radians(),
        aspect_ratio,
        NEAR_PLANE,
        FAR_PLANE,
    );
    projection.y_axis.y *= -1.0;

    projection * view * model
}

/// State rebuilt with every swapchain
struct SwapchainState {
    extent: Extent2D,
    depth: DepthBuffer,
    render_pass: RenderPass,
    pipeline: ModelPipeline,
}

/// Frame recorder drawing one textured mesh
pub struct ModelRecorder {
    device: Arc<VulkanDevice>,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    bounds: Option<Bounds>,
    // Field order: the binding references the texture's view and sampler
    texture_binding: TextureBinding,
    _texture: Texture,
    vertex_shader: Shader,
    fragment_shader: Shader,
    state: Option<SwapchainState>,
}

impl ModelRecorder {
    /// Upload `mesh` and `texture` and load the SPIR-V shader pair
    pub fn new(
        device: Arc<VulkanDevice>,
        mesh: &Mesh,
        texture: &TextureData,
        vertex_spirv: &[u8],
        fragment_spirv: &[u8],
    ) -> Result<Self> {
        mesh.validate()?;
        let ctx = Arc::clone(device.context());

        let vertex_shader = Shader::from_spirv(Arc::clone(&ctx), vertex_spirv, ShaderStage::Vertex)?;
        let fragment_shader = Shader::from_spirv(Arc::clone(&ctx), fragment_spirv, ShaderStage::Fragment)?;
        check_model_interface(
            vertex_shader.interface(),
            fragment_shader.interface(),
            MVP_PUSH_CONSTANT_SIZE,
        )?;

        let vertex_buffer = Buffer::with_data(
            Arc::clone(&ctx),
            "vertex",
            vk::BufferUsageFlags::VERTEX_BUFFER,
            mesh.vertex_bytes(),
        )?;
        let index_buffer = Buffer::with_data(
            Arc::clone(&ctx),
            "index",
            vk::BufferUsageFlags::INDEX_BUFFER,
            mesh.index_bytes(),
        )?;

        let gpu_texture = Texture::upload(Arc::clone(&ctx), texture)?;
        let texture_binding = TextureBinding::new(ctx, &gpu_texture)?;

        engine_info!(
            "ember::vulkan::ModelRecorder",
            "Uploaded mesh ({} vertices, {} triangles)",
            mesh.vertices.len(),
            mesh.triangle_count()
        );

        Ok(Self {
            device,
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
            bounds: mesh.bounds(),
            texture_binding,
            _texture: gpu_texture,
            vertex_shader,
            fragment_shader,
            state: None,
        })
    }

    fn state(&self) -> Result<&SwapchainState> {
        self.state
            .as_ref()
            .ok_or_else(|| engine_err!("ember::vulkan::ModelRecorder", "record() called before prepare()"))
    }

    fn record_commands(
        &self,
        command_buffer: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        state: &SwapchainState,
    ) -> Result<()> {
        let device = &self.device.context().device;
        let mvp = model_view_projection(self.bounds, state.extent.aspect_ratio());

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: CLEAR_COLOR },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];

        let render_pass_begin = vk::RenderPassBeginInfo::default()
            .render_pass(state.render_pass.handle())
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: extent_to_vk(state.extent),
            })
            .clear_values(&clear_values);

        // Replayed every time the image comes round, possibly while still pending
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);

        unsafe {
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| engine_err!("ember::vulkan::ModelRecorder", "Failed to begin command buffer: {:?}", e))?;

            device.cmd_begin_render_pass(command_buffer, &render_pass_begin, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, state.pipeline.handle());
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                state.pipeline.layout(),
                0,
                &[self.texture_binding.set()],
                &[],
            );
            device.cmd_bind_vertex_buffers(command_buffer, 0, &[self.vertex_buffer.handle()], &[0]);
            device.cmd_bind_index_buffer(command_buffer, self.index_buffer.handle(), 0, vk::IndexType::UINT32);
            device.cmd_push_constants(
                command_buffer,
                state.pipeline.layout(),
                vk::ShaderStageFlags::VERTEX,
                0,
                bytemuck::bytes_of(&mvp),
            );
            device.cmd_draw_indexed(command_buffer, self.index_count, 1, 0, 0, 0);
            device.cmd_end_render_pass(command_buffer);

            device
                .end_command_buffer(command_buffer)
                .map_err(|e| engine_err!("ember::vulkan::ModelRecorder", "Failed to end command buffer: {:?}", e))?;
        }
        Ok(())
    }
}

impl FrameRecorder<VulkanDevice> for ModelRecorder {
    fn prepare(&mut self, swapchain: &Swapchain<VulkanDevice>) -> Result<()> {
        self.release();

        let ctx = self.device.context();
        let extent = swapchain.extent();
        let color_format = pixel_format_to_vk(swapchain.surface_format().format);

        let depth = DepthBuffer::new(Arc::clone(ctx), extent)?;
        let render_pass = RenderPass::new(Arc::clone(ctx), color_format, depth.format())?;
        let pipeline = ModelPipeline::new(
            Arc::clone(ctx),
            &render_pass,
            self.texture_binding.layout(),
            &self.vertex_shader,
            &self.fragment_shader,
            extent,
        )?;

        engine_debug!(
            "ember::vulkan::ModelRecorder",
            "Prepared {}x{} (depth {:?}, color {:?})",
            extent.width,
            extent.height,
            depth.format(),
            color_format
        );

        self.state = Some(SwapchainState {
            extent,
            depth,
            render_pass,
            pipeline,
        });
        Ok(())
    }

    fn record(
        &mut self,
        swapchain: &Swapchain<VulkanDevice>,
        image_index: usize,
    ) -> Result<RecordedFrame<VulkanDevice>> {
        let state = self.state()?;
        let color_view = swapchain.image_view(image_index).ok_or_else(|| {
            Error::InvalidResource(format!(
                "image index {} out of range for {} images",
                image_index,
                swapchain.image_count()
            ))
        })?;

        let framebuffer = self.device.create_framebuffer(
            state.render_pass.handle(),
            &[color_view, state.depth.view()],
            extent_to_vk(state.extent),
        )?;

        let command_buffer = match self.device.allocate_command_buffer() {
            Ok(cb) => cb,
            Err(e) => {
                self.device.destroy_framebuffer(framebuffer);
                return Err(e);
            }
        };

        if let Err(e) = self.record_commands(command_buffer, framebuffer, state) {
            self.device.free_command_buffer(command_buffer);
            self.device.destroy_framebuffer(framebuffer);
            return Err(e);
        }

        Ok(RecordedFrame {
            framebuffer,
            command_buffer,
        })
    }

    fn release(&mut self) {
        // Pipeline before render pass, then depth
        if let Some(state) = self.state.take() {
            drop(state.pipeline);
            drop(state.render_pass);
            drop(state.depth);
        }
    }
}

impl Drop for ModelRecorder {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "model_recorder_tests.rs"]
mod tests;
