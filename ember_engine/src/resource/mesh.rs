//! CPU-side mesh data
//!
//! Interleaved position + texture coordinate vertices with a 32-bit index list,
//! ready to be copied into GPU vertex and index buffers.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use crate::error::{Error, Result};

/// One vertex as laid out in the vertex buffer (location 0: position, location 1: uv)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const fn new(position: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, uv }
    }

    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;
    pub const POSITION_OFFSET: u32 = 0;
    pub const UV_OFFSET: u32 = std::mem::size_of::<[f32; 3]>() as u32;
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Radius of the bounding sphere around `center()`
    pub fn radius(&self) -> f32 {
        self.size().length() * 0.5
    }
}

/// Triangle list mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Build a mesh, checking that it is a valid triangle list
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self> {
        let mesh = Self { vertices, indices };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Build from separate attribute streams (missing uvs become zero)
    pub fn from_streams(positions: &[[f32; 3]], uvs: Option<&[[f32; 2]]>, indices: Vec<u32>) -> Result<Self> {
        if let Some(uvs) = uvs {
            if uvs.len() != positions.len() {
                return Err(Error::InvalidResource(format!(
                    "{} positions but {} texture coordinates",
                    positions.len(),
                    uvs.len()
                )));
            }
        }
        let vertices = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| Vertex {
                position,
                uv: uvs.map(|uv| uv[i]).unwrap_or([0.0, 0.0]),
            })
            .collect();
        Self::new(vertices, indices)
    }

    pub fn validate(&self) -> Result<()> {
        if self.vertices.is_empty() {
            return Err(Error::InvalidResource("mesh has no vertices".to_string()));
        }
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(Error::InvalidResource(format!(
                "index count {} is not a non-empty multiple of 3",
                self.indices.len()
            )));
        }
        let vertex_count = self.vertices.len() as u32;
        if let Some(&bad) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(Error::InvalidResource(format!(
                "index {} out of range for {} vertices",
                bad, vertex_count
            )));
        }
        Ok(())
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let first = Vec3::from(self.vertices.first()?.position);
        let (min, max) = self.vertices.iter().fold((first, first), |(min, max), v| {
            let p = Vec3::from(v.position);
            (min.min(p), max.max(p))
        });
        Some(Bounds { min, max })
    }

    /// Unit cube centred on the origin, each face mapped to the full texture
    pub fn cube() -> Self {
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            // normal, u axis, v axis
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, -1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, -1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ];
        let corners = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u_axis, v_axis) in FACES {
            let (n, u, v) = (Vec3::from(normal), Vec3::from(u_axis), Vec3::from(v_axis));
            let base = vertices.len() as u32;
            for corner in corners {
                let position = n * 0.5 + u * (corner.x - 0.5) + v * (corner.y - 0.5);
                vertices.push(Vertex::new(position.to_array(), corner.to_array()));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self { vertices, indices }
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
