/// Buffer - Vulkan buffer with its gpu-allocator memory

use ash::vk;
use ember_engine::ember::{Error, Result};
use ember_engine::{engine_err, engine_error};
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan buffer
pub struct Buffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
}

impl Buffer {
    /// Create an unfilled buffer in `location`
    pub fn new(
        ctx: Arc<GpuContext>,
        name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidResource(format!("{} buffer has zero size", name)));
        }

        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to create {} buffer of {} bytes: {:?}", name, size, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = match ctx.allocate(name, requirements, location, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            // From here on Drop releases both
            let result = Self {
                ctx,
                buffer,
                allocation: Some(allocation),
                size,
            };

            if let Some(allocation) = &result.allocation {
                result
                    .ctx
                    .device
                    .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                    .map_err(|e| engine_err!("ember::vulkan", "Failed to bind {} buffer memory: {:?}", name, e))?;
            }

            Ok(result)
        }
    }

    /// Create a device-local buffer filled with `data` through a staging copy
    pub fn with_data(
        ctx: Arc<GpuContext>,
        name: &str,
        usage: vk::BufferUsageFlags,
        data: &[u8],
    ) -> Result<Self> {
        let size = data.len() as u64;
        let staging = Self::staging(Arc::clone(&ctx), data)?;
        let buffer = Self::new(
            Arc::clone(&ctx),
            name,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
        )?;

        ctx.immediate_submit(|device, command_buffer| unsafe {
            let region = vk::BufferCopy::default().size(size);
            device.cmd_copy_buffer(command_buffer, staging.buffer, buffer.buffer, &[region]);
        })?;

        Ok(buffer)
    }

    /// Host-visible transfer source holding `data`
    pub fn staging(ctx: Arc<GpuContext>, data: &[u8]) -> Result<Self> {
        let staging = Self::new(
            ctx,
            "staging",
            data.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
        )?;
        staging.write(0, data)?;
        Ok(staging)
    }

    /// Copy `data` into mapped memory at `offset`
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        if offset + data.len() as u64 > self.size {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                self.size
            )));
        }

        let allocation = self.allocation.as_ref().ok_or_else(|| {
            engine_error!("ember::vulkan", "Buffer write failed: no GPU allocation");
            Error::BackendError("Buffer has no allocation".to_string())
        })?;

        let mapped = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), data.len());
        }
        Ok(())
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe {
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
