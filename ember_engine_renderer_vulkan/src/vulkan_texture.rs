/// Texture - sampled 2D image and the depth attachment

use ash::vk;
use ember_engine::ember::device::Extent2D;
use ember_engine::ember::resource::TextureData;
use ember_engine::ember::{Error, Result};
use ember_engine::{engine_err, engine_error, engine_info};
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{has_stencil_component, pick_depth_format, DEPTH_FORMAT_CANDIDATES};

/// Image + memory + view, destroyed together
struct ImageAllocation {
    ctx: Arc<GpuContext>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
}

impl ImageAllocation {
    fn new(
        ctx: Arc<GpuContext>,
        name: &str,
        extent: Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect_mask: vk::ImageAspectFlags,
    ) -> Result<Self> {
        unsafe {
            let image_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx
                .device
                .create_image(&image_info, None)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to create {} image: {:?}", name, e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = match ctx.allocate(name, requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            // From here on Drop releases what exists
            let mut result = Self {
                ctx,
                image,
                view: vk::ImageView::null(),
                allocation: Some(allocation),
            };

            if let Some(allocation) = &result.allocation {
                result
                    .ctx
                    .device
                    .bind_image_memory(image, allocation.memory(), allocation.offset())
                    .map_err(|e| engine_err!("ember::vulkan", "Failed to bind {} image memory: {:?}", name, e))?;
            }

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(subresource_range(aspect_mask));

            result.view = result
                .ctx
                .device
                .create_image_view(&view_info, None)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to create {} image view: {:?}", name, e))?;

            Ok(result)
        }
    }
}

impl Drop for ImageAllocation {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
            if let Some(allocation) = self.allocation.take() {
                self.ctx.free(allocation);
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}

fn subresource_range(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Sampled RGBA8 texture with its sampler
pub struct Texture {
    image: ImageAllocation,
    sampler: vk::Sampler,
    extent: Extent2D,
}

impl Texture {
    /// Upload `data` through a staging buffer and leave it shader-readable
    pub fn upload(ctx: Arc<GpuContext>, data: &TextureData) -> Result<Self> {
        let extent = Extent2D::new(data.width(), data.height());
        let staging = Buffer::staging(Arc::clone(&ctx), data.pixels())?;

        let image = ImageAllocation::new(
            Arc::clone(&ctx),
            "texture",
            extent,
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            vk::ImageAspectFlags::COLOR,
        )?;

        let vk_image = image.image;
        ctx.immediate_submit(|device, command_buffer| unsafe {
            let to_transfer = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(vk_image)
                .subresource_range(subresource_range(vk::ImageAspectFlags::COLOR))
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);

            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );

            let region = vk::BufferImageCopy::default()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                });

            device.cmd_copy_buffer_to_image(
                command_buffer,
                staging.handle(),
                vk_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            let to_shader = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(vk_image)
                .subresource_range(subresource_range(vk::ImageAspectFlags::COLOR))
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ);

            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader],
            );
        })?;

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .max_lod(0.0);

        let sampler = unsafe {
            ctx.device
                .create_sampler(&sampler_info, None)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to create texture sampler: {:?}", e))?
        };

        engine_info!("ember::vulkan", "Uploaded texture {}x{}", extent.width, extent.height);

        Ok(Self { image, sampler, extent })
    }

    pub fn view(&self) -> vk::ImageView {
        self.image.view
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.image.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Depth attachment sized to the swapchain
pub struct DepthBuffer {
    image: ImageAllocation,
    format: vk::Format,
}

impl DepthBuffer {
    pub fn new(ctx: Arc<GpuContext>, extent: Extent2D) -> Result<Self> {
        let format = pick_depth_format(&DEPTH_FORMAT_CANDIDATES, |f| ctx.optimal_tiling_features(f))
            .ok_or_else(|| {
                engine_error!("ember::vulkan", "No supported depth attachment format");
                Error::ResourceCreationFailed("no supported depth format".to_string())
            })?;

        let aspect_mask = if has_stencil_component(format) {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        };

        let image = ImageAllocation::new(
            ctx,
            "depth",
            extent,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect_mask,
        )?;

        Ok(Self { image, format })
    }

    pub fn view(&self) -> vk::ImageView {
        self.image.view
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }
}
