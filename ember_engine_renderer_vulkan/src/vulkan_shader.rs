/// Shader - SPIR-V module with its reflected interface

use ash::vk;
use ember_engine::ember::{Error, Result};
use ember_engine::{engine_bail, engine_err};
use std::io::Cursor;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Pipeline stage a shader module is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn to_vk(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

/// Resources a shader references, as reported by SPIR-V reflection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderInterface {
    /// Stage input locations
    pub input_locations: Vec<u32>,
    /// (set, binding) of every combined image sampler
    pub combined_image_samplers: Vec<(u32, u32)>,
    /// Push constant block size in bytes
    pub push_constant_size: Option<u32>,
}

/// Reflect the interface of a SPIR-V binary
pub fn reflect_interface(code: &[u32]) -> Result<ShaderInterface> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("ember::vulkan", "SPIR-V reflection failed: {:?}", e))?;

    let mut interface = ShaderInterface::default();

    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            match var {
                spirq::var::Variable::Input { location, .. } => {
                    interface.input_locations.push(location.loc());
                }
                spirq::var::Variable::Descriptor { desc_bind, desc_ty, .. } => {
                    if matches!(desc_ty, spirq::ty::DescriptorType::CombinedImageSampler()) {
                        interface
                            .combined_image_samplers
                            .push((desc_bind.set(), desc_bind.bind()));
                    }
                }
                spirq::var::Variable::PushConstant { ty, .. } => {
                    interface.push_constant_size = ty.nbyte().map(|s| s as u32);
                }
                _ => {}
            }
        }
    }

    interface.input_locations.sort_unstable();
    interface.input_locations.dedup();
    Ok(interface)
}

/// Check that a vertex/fragment pair matches the model pipeline layout
///
/// Vertex inputs must be a subset of {0: position, 1: uv}, the push constant
/// block must fit `push_constant_size`, and every sampler must be set 0 binding 0.
pub fn check_model_interface(
    vertex: &ShaderInterface,
    fragment: &ShaderInterface,
    push_constant_size: u32,
) -> Result<()> {
    if let Some(&location) = vertex.input_locations.iter().find(|&&l| l > 1) {
        engine_bail!("ember::vulkan", "Vertex shader reads unsupported input location {}", location);
    }

    for interface in [vertex, fragment] {
        if let Some(size) = interface.push_constant_size {
            if size > push_constant_size {
                engine_bail!(
                    "ember::vulkan",
                    "Push constant block is {} bytes, pipeline provides {}",
                    size,
                    push_constant_size
                );
            }
        }
        if let Some(&(set, binding)) = interface
            .combined_image_samplers
            .iter()
            .find(|&&slot| slot != (0, 0))
        {
            engine_bail!(
                "ember::vulkan",
                "Sampler at set {} binding {} is not provided (only set 0 binding 0)",
                set,
                binding
            );
        }
    }
    Ok(())
}

/// Vulkan shader module
pub struct Shader {
    ctx: Arc<GpuContext>,
    module: vk::ShaderModule,
    stage: ShaderStage,
    interface: ShaderInterface,
}

impl Shader {
    /// Create a module from SPIR-V bytes (any alignment)
    pub fn from_spirv(ctx: Arc<GpuContext>, bytes: &[u8], stage: ShaderStage) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(Error::InvalidResource(format!(
                "SPIR-V size {} is not a multiple of 4",
                bytes.len()
            )));
        }

        let code = ash::util::read_spv(&mut Cursor::new(bytes))
            .map_err(|e| Error::InvalidResource(format!("Invalid SPIR-V: {}", e)))?;

        let interface = reflect_interface(&code)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe {
            ctx.device
                .create_shader_module(&create_info, None)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to create shader module: {:?}", e))?
        };

        Ok(Self {
            ctx,
            module,
            stage,
            interface,
        })
    }

    pub fn module(&self) -> vk::ShaderModule {
        self.module
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn interface(&self) -> &ShaderInterface {
        &self.interface
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
