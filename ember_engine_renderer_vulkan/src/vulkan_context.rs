/// GpuContext - instance, surface, logical device, queues and allocator
///
/// Shared (via `Arc`) by the device wrapper and every GPU resource, so the
/// Vulkan objects it owns are destroyed only after the last buffer, texture or
/// shader referencing them is gone.

use ash::vk;
use ember_engine::ember::{Error, Result};
use ember_engine::{engine_debug, engine_err, engine_error};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

/// Validation messenger and its loader
pub(crate) struct DebugMessenger {
    pub loader: ash::ext::debug_utils::Instance,
    pub messenger: vk::DebugUtilsMessengerEXT,
}

/// Shared GPU context for all Vulkan resources
pub struct GpuContext {
    /// Keeps the Vulkan library loaded for the lifetime of the instance
    _entry: ash::Entry,
    pub instance: ash::Instance,
    pub(crate) debug_messenger: Option<DebugMessenger>,

    pub surface_loader: ash::khr::surface::Instance,
    pub surface: vk::SurfaceKHR,

    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue: vk::Queue,
    pub present_queue_family: u32,

    /// Serializes every `vkQueue*` call (graphics and present may be the same queue)
    queue_lock: Mutex<()>,

    /// Dropped before the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Pool for one-shot upload command buffers
    upload_command_pool: Mutex<vk::CommandPool>,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        debug_messenger: Option<DebugMessenger>,
        surface_loader: ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        graphics_queue_family: u32,
        present_queue_family: u32,
        allocator: Allocator,
        upload_command_pool: vk::CommandPool,
    ) -> Self {
        let (graphics_queue, present_queue) = unsafe {
            (
                device.get_device_queue(graphics_queue_family, 0),
                device.get_device_queue(present_queue_family, 0),
            )
        };

        Self {
            _entry: entry,
            instance,
            debug_messenger,
            surface_loader,
            surface,
            physical_device,
            device,
            graphics_queue,
            graphics_queue_family,
            present_queue,
            present_queue_family,
            queue_lock: Mutex::new(()),
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            upload_command_pool: Mutex::new(upload_command_pool),
        }
    }

    /// Exclusive access to the queues
    pub fn lock_queues(&self) -> MutexGuard<'_, ()> {
        self.queue_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Allocate and bind-ready memory for `requirements`
    pub fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let mut allocator = self
            .allocator
            .lock()
            .map_err(|_| engine_err!("ember::vulkan", "GPU allocator lock poisoned"))?;

        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("ember::vulkan", "Out of GPU memory for {} ({:.2} MB): {}", name, size_mb, e);
                Error::OutOfMemory
            })
    }

    /// Return an allocation to the allocator
    pub fn free(&self, allocation: Allocation) {
        if let Ok(mut allocator) = self.allocator.lock() {
            allocator.free(allocation).ok();
        }
    }

    /// Format features for optimal tiling
    pub fn optimal_tiling_features(&self, format: vk::Format) -> vk::FormatFeatureFlags {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
                .optimal_tiling_features
        }
    }

    /// Record commands into a one-shot buffer, submit them and wait for completion
    pub fn immediate_submit<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let pool = *self
            .upload_command_pool
            .lock()
            .map_err(|_| engine_err!("ember::vulkan", "Upload command pool lock poisoned"))?;

        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = self
                .device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to allocate upload command buffer: {:?}", e))?[0];

            let result = self.record_and_wait(command_buffer, record);

            self.device.free_command_buffers(pool, &[command_buffer]);
            result
        }
    }

    unsafe fn record_and_wait<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        self.device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| engine_err!("ember::vulkan", "Failed to begin upload command buffer: {:?}", e))?;

        record(&self.device, command_buffer);

        self.device
            .end_command_buffer(command_buffer)
            .map_err(|e| engine_err!("ember::vulkan", "Failed to end upload command buffer: {:?}", e))?;

        let fence = self
            .device
            .create_fence(&vk::FenceCreateInfo::default(), None)
            .map_err(|e| engine_err!("ember::vulkan", "Failed to create upload fence: {:?}", e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        let submitted = {
            let _queues = self.lock_queues();
            self.device.queue_submit(self.graphics_queue, &[submit_info], fence)
        };

        let result = submitted
            .and_then(|_| self.device.wait_for_fences(&[fence], true, u64::MAX))
            .map_err(|e| engine_err!("ember::vulkan", "Upload submission failed: {:?}", e));

        self.device.destroy_fence(fence, None);
        result
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            if let Ok(pool) = self.upload_command_pool.get_mut() {
                self.device.destroy_command_pool(*pool, None);
            }

            // Free VkDeviceMemory pages before the device goes away
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);

            if let Some(debug) = self.debug_messenger.take() {
                #[cfg(feature = "vulkan-validation")]
                crate::debug::cleanup_debug_config();
                debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
            }

            self.instance.destroy_instance(None);
        }
        engine_debug!("ember::vulkan", "GPU context destroyed");
    }
}
