/// Pipeline - render pass, texture descriptor set and the model graphics pipeline

use ash::vk;
use ember_engine::ember::device::Extent2D;
use ember_engine::ember::resource::Vertex;
use ember_engine::ember::Result;
use ember_engine::{engine_debug, engine_err};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::extent_to_vk;
use crate::vulkan_shader::Shader;
use crate::vulkan_texture::Texture;

/// Size of the vertex-stage push constant block (one column-major mat4)
pub const MVP_PUSH_CONSTANT_SIZE: u32 = 64;

/// Vertex binding 0 and its attributes: position at location 0, uv at location 1
pub(crate) fn vertex_input_descriptions() -> (
    vk::VertexInputBindingDescription,
    [vk::VertexInputAttributeDescription; 2],
) {
    let binding = vk::VertexInputBindingDescription {
        binding: 0,
        stride: Vertex::STRIDE,
        input_rate: vk::VertexInputRate::VERTEX,
    };

    let attributes = [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: Vertex::POSITION_OFFSET,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: Vertex::UV_OFFSET,
        },
    ];

    (binding, attributes)
}

/// Render pass with one presentable color attachment and a depth attachment
pub struct RenderPass {
    ctx: Arc<GpuContext>,
    render_pass: vk::RenderPass,
}

impl RenderPass {
    pub fn new(ctx: Arc<GpuContext>, color_format: vk::Format, depth_format: vk::Format) -> Result<Self> {
        let attachments = [
            vk::AttachmentDescription::default()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            vk::AttachmentDescription::default()
                .format(depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];

        let color_refs = [vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
        let depth_ref = vk::AttachmentReference::default()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref);

        // Layout transition waits for the acquire semaphore stage
        let stage_mask = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stage_mask)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stage_mask)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            );

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        let render_pass = unsafe {
            ctx.device
                .create_render_pass(&render_pass_info, None)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to create render pass: {:?}", e))?
        };

        Ok(Self { ctx, render_pass })
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Descriptor set exposing one texture at set 0, binding 0
pub struct TextureBinding {
    ctx: Arc<GpuContext>,
    layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    set: vk::DescriptorSet,
}

impl TextureBinding {
    pub fn new(ctx: Arc<GpuContext>, texture: &Texture) -> Result<Self> {
        unsafe {
            let bindings = [vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT)];

            let layout = ctx
                .device
                .create_descriptor_set_layout(&vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings), None)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to create descriptor set layout: {:?}", e))?;

            let pool_sizes = [vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 1,
            }];
            let pool_info = vk::DescriptorPoolCreateInfo::default()
                .max_sets(1)
                .pool_sizes(&pool_sizes);

            let pool = match ctx.device.create_descriptor_pool(&pool_info, None) {
                Ok(pool) => pool,
                Err(e) => {
                    ctx.device.destroy_descriptor_set_layout(layout, None);
                    return Err(engine_err!("ember::vulkan", "Failed to create descriptor pool: {:?}", e));
                }
            };

            // From here on Drop releases pool and layout
            let mut binding = Self {
                ctx,
                layout,
                pool,
                set: vk::DescriptorSet::null(),
            };

            let set_layouts = [layout];
            let allocate_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&set_layouts);

            binding.set = binding
                .ctx
                .device
                .allocate_descriptor_sets(&allocate_info)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to allocate descriptor set: {:?}", e))?
                .into_iter()
                .next()
                .ok_or_else(|| engine_err!("ember::vulkan", "Descriptor pool returned no set"))?;

            let image_infos = [vk::DescriptorImageInfo::default()
                .sampler(texture.sampler())
                .image_view(texture.view())
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];

            let write = vk::WriteDescriptorSet::default()
                .dst_set(binding.set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_infos);

            binding.ctx.device.update_descriptor_sets(&[write], &[]);

            Ok(binding)
        }
    }

    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    pub fn set(&self) -> vk::DescriptorSet {
        self.set
    }
}

impl Drop for TextureBinding {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees the set
            self.ctx.device.destroy_descriptor_pool(self.pool, None);
            self.ctx.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Graphics pipeline drawing textured triangles with an MVP push constant
///
/// Viewport and scissor are baked in, so the pipeline is rebuilt whenever the
/// swapchain extent changes.
pub struct ModelPipeline {
    ctx: Arc<GpuContext>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl ModelPipeline {
    pub fn new(
        ctx: Arc<GpuContext>,
        render_pass: &RenderPass,
        set_layout: vk::DescriptorSetLayout,
        vertex_shader: &Shader,
        fragment_shader: &Shader,
        extent: Extent2D,
    ) -> Result<Self> {
        unsafe {
            let set_layouts = [set_layout];
            let push_constant_ranges = [vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::VERTEX,
                offset: 0,
                size: MVP_PUSH_CONSTANT_SIZE,
            }];
            let layout_info = vk::PipelineLayoutCreateInfo::default()
                .set_layouts(&set_layouts)
                .push_constant_ranges(&push_constant_ranges);

            let layout = ctx
                .device
                .create_pipeline_layout(&layout_info, None)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to create pipeline layout: {:?}", e))?;

            let shader_stages = [
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(vertex_shader.stage().to_vk())
                    .module(vertex_shader.module())
                    .name(c"main"),
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(fragment_shader.stage().to_vk())
                    .module(fragment_shader.module())
                    .name(c"main"),
            ];

            let (binding, attributes) = vertex_input_descriptions();
            let bindings = [binding];
            let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
                .vertex_binding_descriptions(&bindings)
                .vertex_attribute_descriptions(&attributes);

            let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
                .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
                .primitive_restart_enable(false);

            let vk_extent = extent_to_vk(extent);
            let viewports = [vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: vk_extent.width as f32,
                height: vk_extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }];
            let scissors = [vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk_extent,
            }];
            let viewport_state = vk::PipelineViewportStateCreateInfo::default()
                .viewports(&viewports)
                .scissors(&scissors);

            // Imported models do not agree on winding
            let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
                .depth_clamp_enable(false)
                .rasterizer_discard_enable(false)
                .polygon_mode(vk::PolygonMode::FILL)
                .line_width(1.0)
                .cull_mode(vk::CullModeFlags::NONE)
                .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
                .depth_bias_enable(false);

            let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(true)
                .depth_write_enable(true)
                .depth_compare_op(vk::CompareOp::LESS)
                .depth_bounds_test_enable(false)
                .stencil_test_enable(false);

            let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
                .sample_shading_enable(false)
                .rasterization_samples(vk::SampleCountFlags::TYPE_1);

            let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false);
            let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
                .logic_op_enable(false)
                .attachments(std::slice::from_ref(&color_blend_attachment));

            let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
                .stages(&shader_stages)
                .vertex_input_state(&vertex_input_state)
                .input_assembly_state(&input_assembly_state)
                .viewport_state(&viewport_state)
                .rasterization_state(&rasterization_state)
                .depth_stencil_state(&depth_stencil_state)
                .multisample_state(&multisample_state)
                .color_blend_state(&color_blend_state)
                .layout(layout)
                .render_pass(render_pass.handle())
                .subpass(0);

            let pipeline = match ctx.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info],
                None,
            ) {
                Ok(pipelines) => pipelines[0],
                Err((_, e)) => {
                    ctx.device.destroy_pipeline_layout(layout, None);
                    return Err(engine_err!("ember::vulkan", "Failed to create graphics pipeline: {:?}", e));
                }
            };

            engine_debug!(
                "ember::vulkan",
                "Created model pipeline for {}x{}",
                extent.width,
                extent.height
            );

            Ok(Self { ctx, pipeline, layout })
        }
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for ModelPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
