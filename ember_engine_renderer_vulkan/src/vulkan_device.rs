/// VulkanDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Owns the swapchain loader and the command pool the per-image command
/// buffers come from. Instance, surface, logical device and allocator live in
/// the shared [`GpuContext`].

use ash::vk;
use ember_engine::ember::device::{
    GraphicsDevice, QueueFamilies, Submission, SurfaceFormat, SurfaceSupport,
};
use ember_engine::ember::render::SwapchainConfig;
use ember_engine::ember::{Error, RendererConfig, Result, StaleReason};
use ember_engine::{engine_debug, engine_err, engine_error, engine_info, engine_warn};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::sync::{Arc, Mutex};

use crate::vulkan_context::{DebugMessenger, GpuContext};
use crate::vulkan_format::{
    capabilities_from_vk, color_space_to_vk, extent_to_vk, pipeline_stages_to_vk,
    pixel_format_to_vk, present_mode_from_vk, present_mode_to_vk, presentation_error,
    surface_format_from_vk,
};

/// Queue families and surface suitability of one physical device
struct DeviceCandidate {
    physical_device: vk::PhysicalDevice,
    families: QueueFamilies,
    discrete: bool,
    name: String,
}

/// Vulkan device, queues and presentation surface
pub struct VulkanDevice {
    ctx: Arc<GpuContext>,
    swapchain_loader: ash::khr::swapchain::Device,
    /// Pool for the pre-recorded per-image command buffers
    command_pool: Mutex<vk::CommandPool>,
}

impl VulkanDevice {
    /// Create instance, surface and device for `window`
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        config: &RendererConfig,
    ) -> Result<Self> {
        config.validate()?;

        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!("ember::vulkan", "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let display_handle = window.display_handle().map_err(|e| {
                engine_error!("ember::vulkan", "Failed to get display handle: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?;
            let window_handle = window.window_handle().map_err(|e| {
                engine_error!("ember::vulkan", "Failed to get window handle: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?;

            let validation = Self::validation_enabled(config);
            let instance = Self::create_instance(&entry, display_handle.as_raw(), config, validation)?;
            let debug_messenger = if validation {
                Self::create_debug_messenger(&entry, &instance, config)
            } else {
                None
            };

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let surface = match ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            ) {
                Ok(surface) => surface,
                Err(e) => {
                    Self::destroy_instance(&instance, debug_messenger);
                    engine_error!("ember::vulkan", "Failed to create surface: {:?}", e);
                    return Err(Error::InitializationFailed(format!("Failed to create surface: {:?}", e)));
                }
            };

            let created = Self::select_physical_device(&instance, &surface_loader, surface)
                .and_then(|candidate| {
                    let device = Self::create_logical_device(&instance, &candidate)?;
                    Ok((candidate, device))
                })
                .and_then(|(candidate, device)| {
                    match Self::create_allocator_and_pools(&instance, &device, &candidate) {
                        Ok(parts) => Ok((candidate, device, parts)),
                        Err(e) => {
                            device.destroy_device(None);
                            Err(e)
                        }
                    }
                });

            let (candidate, device, (allocator, upload_pool, command_pool)) = match created {
                Ok(parts) => parts,
                Err(e) => {
                    surface_loader.destroy_surface(surface, None);
                    Self::destroy_instance(&instance, debug_messenger);
                    return Err(e);
                }
            };

            engine_info!(
                "ember::vulkan",
                "Using GPU '{}' (graphics family {}, present family {})",
                candidate.name,
                candidate.families.graphics,
                candidate.families.present
            );

            let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

            let ctx = Arc::new(GpuContext::new(
                entry,
                instance,
                debug_messenger,
                surface_loader,
                surface,
                candidate.physical_device,
                device,
                candidate.families.graphics,
                candidate.families.present,
                allocator,
                upload_pool,
            ));

            Ok(Self {
                ctx,
                swapchain_loader,
                command_pool: Mutex::new(command_pool),
            })
        }
    }

    #[cfg(feature = "vulkan-validation")]
    fn validation_enabled(config: &RendererConfig) -> bool {
        config.enable_validation
    }

    #[cfg(not(feature = "vulkan-validation"))]
    fn validation_enabled(config: &RendererConfig) -> bool {
        if config.enable_validation {
            engine_warn!(
                "ember::vulkan",
                "Validation requested but the crate was built without the vulkan-validation feature"
            );
        }
        false
    }

    unsafe fn create_instance(
        entry: &ash::Entry,
        display_handle: raw_window_handle::RawDisplayHandle,
        config: &RendererConfig,
        validation: bool,
    ) -> Result<ash::Instance> {
        let app_name = CString::new(config.app_name.clone())
            .map_err(|_| Error::InvalidResource("application name contains a NUL byte".to_string()))?;
        let (major, minor, patch) = config.app_version;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(c"Ember")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        let mut extension_names = ash_window::enumerate_required_extensions(display_handle)
            .map_err(|e| {
                engine_error!("ember::vulkan", "Failed to get required extensions: {}", e);
                Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
            })?
            .to_vec();

        if validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layer_names = if validation {
            vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        entry.create_instance(&create_info, None).map_err(|e| {
            engine_error!("ember::vulkan", "Failed to create Vulkan instance: {:?}", e);
            Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
        })
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &RendererConfig,
    ) -> Option<DebugMessenger> {
        crate::debug::init_debug_config(crate::debug::Config::from(config));

        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = crate::debug::messenger_create_info(config.debug_severity);

        match loader.create_debug_utils_messenger(&create_info, None) {
            Ok(messenger) => Some(DebugMessenger { loader, messenger }),
            Err(e) => {
                // Rendering works without the messenger
                engine_warn!("ember::vulkan", "Failed to create debug messenger: {:?}", e);
                crate::debug::cleanup_debug_config();
                None
            }
        }
    }

    #[cfg(not(feature = "vulkan-validation"))]
    unsafe fn create_debug_messenger(
        _entry: &ash::Entry,
        _instance: &ash::Instance,
        _config: &RendererConfig,
    ) -> Option<DebugMessenger> {
        None
    }

    unsafe fn destroy_instance(instance: &ash::Instance, debug_messenger: Option<DebugMessenger>) {
        if let Some(debug) = debug_messenger {
            #[cfg(feature = "vulkan-validation")]
            crate::debug::cleanup_debug_config();
            debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
        }
        instance.destroy_instance(None);
    }

    /// First device with graphics + present queues, the swapchain extension and
    /// at least one surface format and present mode; discrete GPUs preferred
    unsafe fn select_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<DeviceCandidate> {
        let physical_devices = instance.enumerate_physical_devices().map_err(|e| {
            engine_error!("ember::vulkan", "Failed to enumerate physical devices: {:?}", e);
            Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
        })?;

        let mut candidates: Vec<DeviceCandidate> = physical_devices
            .into_iter()
            .filter_map(|pd| Self::evaluate_device(instance, surface_loader, surface, pd))
            .collect();

        candidates.sort_by_key(|c| !c.discrete);

        candidates.into_iter().next().ok_or_else(|| {
            engine_error!("ember::vulkan", "No GPU can render and present to this surface");
            Error::InitializationFailed("No suitable Vulkan device found".to_string())
        })
    }

    unsafe fn evaluate_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Option<DeviceCandidate> {
        let properties = instance.get_physical_device_properties(physical_device);
        let name = properties
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
        let graphics = queue_families
            .iter()
            .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))? as u32;

        let supports_present = |index: u32| {
            surface_loader
                .get_physical_device_surface_support(physical_device, index, surface)
                .unwrap_or(false)
        };
        let present = if supports_present(graphics) {
            graphics
        } else {
            (0..queue_families.len() as u32).find(|&i| supports_present(i))?
        };

        let extensions = instance
            .enumerate_device_extension_properties(physical_device)
            .ok()?;
        let has_swapchain = extensions.iter().any(|ext| {
            ext.extension_name_as_c_str()
                .map(|n| n == ash::khr::swapchain::NAME)
                .unwrap_or(false)
        });
        if !has_swapchain {
            engine_debug!("ember::vulkan", "Skipping '{}': no swapchain extension", name);
            return None;
        }

        let formats = surface_loader
            .get_physical_device_surface_formats(physical_device, surface)
            .ok()?;
        let modes = surface_loader
            .get_physical_device_surface_present_modes(physical_device, surface)
            .ok()?;
        if formats.is_empty() || modes.is_empty() {
            engine_debug!("ember::vulkan", "Skipping '{}': surface unsupported", name);
            return None;
        }

        Some(DeviceCandidate {
            physical_device,
            families: QueueFamilies { graphics, present },
            discrete: properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU,
            name,
        })
    }

    unsafe fn create_logical_device(
        instance: &ash::Instance,
        candidate: &DeviceCandidate,
    ) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = candidate
            .families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default();

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .enabled_features(&device_features);

        instance
            .create_device(candidate.physical_device, &device_create_info, None)
            .map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create logical device: {:?}", e);
                Error::InitializationFailed(format!("Failed to create device: {:?}", e))
            })
    }

    unsafe fn create_allocator_and_pools(
        instance: &ash::Instance,
        device: &ash::Device,
        candidate: &DeviceCandidate,
    ) -> Result<(Allocator, vk::CommandPool, vk::CommandPool)> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device: candidate.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| {
            engine_error!("ember::vulkan", "Failed to create GPU allocator: {:?}", e);
            Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
        })?;

        let upload_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(candidate.families.graphics)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let upload_pool = device.create_command_pool(&upload_pool_info, None).map_err(|e| {
            engine_error!("ember::vulkan", "Failed to create upload command pool: {:?}", e);
            Error::InitializationFailed(format!("Failed to create upload command pool: {:?}", e))
        })?;

        let frame_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(candidate.families.graphics);
        let frame_pool = match device.create_command_pool(&frame_pool_info, None) {
            Ok(pool) => pool,
            Err(e) => {
                device.destroy_command_pool(upload_pool, None);
                engine_error!("ember::vulkan", "Failed to create command pool: {:?}", e);
                return Err(Error::InitializationFailed(format!("Failed to create command pool: {:?}", e)));
            }
        };

        Ok((allocator, upload_pool, frame_pool))
    }

    /// Shared context for resources created on this device
    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Allocate a primary command buffer from the frame pool
    pub fn allocate_command_buffer(&self) -> Result<vk::CommandBuffer> {
        let pool = self
            .command_pool
            .lock()
            .map_err(|_| engine_err!("ember::vulkan", "Command pool lock poisoned"))?;

        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(*pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        unsafe {
            self.ctx
                .device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to allocate command buffer: {:?}", e);
                    Error::ResourceCreationFailed(format!("command buffer: {:?}", e))
                })?
                .into_iter()
                .next()
                .ok_or_else(|| Error::ResourceCreationFailed("no command buffer returned".to_string()))
        }
    }

    /// Create a framebuffer over `attachments`
    pub fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        unsafe {
            self.ctx.device.create_framebuffer(&create_info, None).map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create framebuffer: {:?}", e);
                Error::ResourceCreationFailed(format!("framebuffer: {:?}", e))
            })
        }
    }

    /// Consume an acquire semaphore without rendering (suboptimal acquire)
    fn drain_semaphore(&self, semaphore: vk::Semaphore) -> Result<()> {
        let wait_semaphores = [semaphore];
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages);

        let _queues = self.ctx.lock_queues();
        unsafe {
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], vk::Fence::null())
                .map_err(|e| submission_error(e, "empty submission"))
        }
    }
}

fn submission_error(result: vk::Result, what: &str) -> Error {
    engine_error!("ember::vulkan", "Queue {} failed: {:?}", what, result);
    match result {
        vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost(format!("{} failed", what)),
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            Error::OutOfMemory
        }
        other => Error::SubmissionFailed(format!("{} failed: {:?}", what, other)),
    }
}

fn wait_error(result: vk::Result) -> Error {
    match result {
        vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost("fence wait failed".to_string()),
        other => engine_err!("ember::vulkan", "Fence wait failed: {:?}", other),
    }
}

impl GraphicsDevice for VulkanDevice {
    type Semaphore = vk::Semaphore;
    type Fence = vk::Fence;
    type SwapchainHandle = vk::SwapchainKHR;
    type Image = vk::Image;
    type ImageView = vk::ImageView;
    type Framebuffer = vk::Framebuffer;
    type CommandBuffer = vk::CommandBuffer;

    fn queue_families(&self) -> QueueFamilies {
        QueueFamilies {
            graphics: self.ctx.graphics_queue_family,
            present: self.ctx.present_queue_family,
        }
    }

    fn surface_support(&self) -> Result<SurfaceSupport> {
        let (pd, surface, loader) = (self.ctx.physical_device, self.ctx.surface, &self.ctx.surface_loader);
        unsafe {
            let caps = loader
                .get_physical_device_surface_capabilities(pd, surface)
                .map_err(|e| presentation_error(e, "surface capabilities query"))?;
            let formats = loader
                .get_physical_device_surface_formats(pd, surface)
                .map_err(|e| presentation_error(e, "surface formats query"))?;
            let modes = loader
                .get_physical_device_surface_present_modes(pd, surface)
                .map_err(|e| presentation_error(e, "present modes query"))?;

            Ok(SurfaceSupport {
                capabilities: capabilities_from_vk(&caps),
                formats: formats.iter().map(surface_format_from_vk).collect(),
                present_modes: modes.into_iter().filter_map(present_mode_from_vk).collect(),
            })
        }
    }

    fn create_swapchain(&self, config: &SwapchainConfig) -> Result<vk::SwapchainKHR> {
        unsafe {
            let caps = self
                .ctx
                .surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.ctx.surface)
                .map_err(|e| presentation_error(e, "surface capabilities query"))?;

            let families = self.queue_families();
            let family_indices = families.unique();
            let sharing_mode = if families.is_shared() {
                vk::SharingMode::EXCLUSIVE
            } else {
                vk::SharingMode::CONCURRENT
            };

            let mut create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.ctx.surface)
                .min_image_count(config.image_count)
                .image_format(pixel_format_to_vk(config.surface_format.format))
                .image_color_space(color_space_to_vk(config.surface_format.color_space))
                .image_extent(extent_to_vk(config.extent))
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .image_sharing_mode(sharing_mode)
                .pre_transform(caps.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(present_mode_to_vk(config.present_mode))
                .clipped(true);

            if !families.is_shared() {
                create_info = create_info.queue_family_indices(&family_indices);
            }

            let swapchain = self
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to create swapchain: {:?}", e);
                    Error::ResourceCreationFailed(format!("swapchain: {:?}", e))
                })?;

            engine_debug!(
                "ember::vulkan",
                "Created swapchain {:?} ({}x{}, sharing {:?})",
                swapchain,
                config.extent.width,
                config.extent.height,
                sharing_mode
            );
            Ok(swapchain)
        }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        unsafe {
            self.swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to get swapchain images: {:?}", e);
                    Error::ResourceCreationFailed(format!("swapchain images: {:?}", e))
                })
        }
    }

    fn create_image_view(&self, image: vk::Image, format: SurfaceFormat) -> Result<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(pixel_format_to_vk(format.format))
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe {
            self.ctx.device.create_image_view(&create_info, None).map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create swapchain image view: {:?}", e);
                Error::ResourceCreationFailed(format!("image view: {:?}", e))
            })
        }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.ctx.device.destroy_image_view(view, None) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        signal: vk::Semaphore,
    ) -> Result<u32> {
        let acquired = unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, timeout_ns, signal, vk::Fence::null())
        };

        match acquired {
            Ok((image_index, false)) => Ok(image_index),
            Ok((_, true)) => {
                // The image is abandoned; unsignal the semaphore so the slot can reuse it
                self.drain_semaphore(signal)?;
                Err(Error::SwapchainStale(StaleReason::Suboptimal))
            }
            Err(e) => Err(presentation_error(e, "acquire")),
        }
    }

    fn present(&self, swapchain: vk::SwapchainKHR, image_index: u32, wait: vk::Semaphore) -> Result<()> {
        let wait_semaphores = [wait];
        let swapchains = [swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = {
            let _queues = self.ctx.lock_queues();
            unsafe { self.swapchain_loader.queue_present(self.ctx.present_queue, &present_info) }
        };

        match presented {
            Ok(false) => Ok(()),
            Ok(true) => Err(Error::SwapchainStale(StaleReason::Suboptimal)),
            Err(e) => Err(presentation_error(e, "present")),
        }
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        unsafe {
            self.ctx
                .device
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to create semaphore: {:?}", e);
                    Error::ResourceCreationFailed(format!("semaphore: {:?}", e))
                })
        }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.ctx.device.destroy_semaphore(semaphore, None) }
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        unsafe {
            self.ctx
                .device
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to create fence: {:?}", e);
                    Error::ResourceCreationFailed(format!("fence: {:?}", e))
                })
        }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.ctx.device.destroy_fence(fence, None) }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .wait_for_fences(&[fence], true, timeout_ns)
                .map_err(wait_error)
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_fences(&[fence])
                .map_err(|e| engine_err!("ember::vulkan", "Failed to reset fence: {:?}", e))
        }
    }

    fn submit(&self, submission: &Submission<'_, Self>) -> Result<()> {
        let wait_semaphores = [*submission.wait_semaphore];
        let wait_stages = [pipeline_stages_to_vk(submission.wait_stage)];
        let command_buffers = [*submission.command_buffer];
        let signal_semaphores = [*submission.signal_semaphore];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let _queues = self.ctx.lock_queues();
        unsafe {
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], *submission.fence)
                .map_err(|e| submission_error(e, "submit"))
        }
    }

    fn wait_idle(&self) -> Result<()> {
        let _queues = self.ctx.lock_queues();
        unsafe {
            self.ctx.device.device_wait_idle().map_err(|e| match e {
                vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost("wait idle failed".to_string()),
                other => engine_err!("ember::vulkan", "Failed to wait idle: {:?}", other),
            })
        }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.ctx.device.destroy_framebuffer(framebuffer, None) }
    }

    fn free_command_buffer(&self, command_buffer: vk::CommandBuffer) {
        if let Ok(pool) = self.command_pool.lock() {
            unsafe { self.ctx.device.free_command_buffers(*pool, &[command_buffer]) }
        }
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
            if let Ok(pool) = self.command_pool.get_mut() {
                self.ctx.device.destroy_command_pool(*pool, None);
            }
        }
        engine_debug!("ember::vulkan", "Vulkan device released");
    }
}
