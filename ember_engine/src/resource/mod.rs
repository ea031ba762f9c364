//! Resource module
//!
//! CPU-side geometry and image data handed to a backend for upload.

pub mod mesh;
pub mod texture;

pub use mesh::{Mesh, Vertex, Bounds};
pub use texture::{TextureData, RGBA8_TEXEL_SIZE};
